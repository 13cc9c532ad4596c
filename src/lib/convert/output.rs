//! Serialization of annotated matrices into array containers
//!
//! Every writer streams into a staging path next to the destination; the
//! destination is only replaced once the writer reports success, so a
//! partial container is never advertised as complete.

use crate::convert::assemble::AnnotatedMatrix;
use crate::core::error::{FryconvError, Result};
use crate::core::fs::{discard_staged, make_parent_dirs, promote_staged, staging_path};
use crate::core::sparse::SparseOps;
use anndata::data::array::dataframe::DataFrameIndex;
use anndata::{AnnData, AnnDataOp, AxisArraysOp};
use anndata_hdf5::H5;
use anndata_zarr::Zarr;
use hdf5::types::VarLenUnicode;
use log::info;
use nalgebra_sparse::CsrMatrix;
use ndarray::Array2;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

/// Supported output containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    H5ad,
    Loom,
    Csvs,
    Zarr,
}

impl OutputFormat {
    pub fn name(self) -> &'static str {
        match self {
            OutputFormat::H5ad => "h5ad",
            OutputFormat::Loom => "loom",
            OutputFormat::Csvs => "csvs",
            OutputFormat::Zarr => "zarr",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = FryconvError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "h5ad" => Ok(OutputFormat::H5ad),
            "loom" => Ok(OutputFormat::Loom),
            "csvs" => Ok(OutputFormat::Csvs),
            "zarr" => Ok(OutputFormat::Zarr),
            other => Err(FryconvError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Write `matrix` to `destination` in the requested container format.
pub fn serialize(matrix: &AnnotatedMatrix, destination: &Path, format: OutputFormat) -> Result<()> {
    matrix.validate_dimensions()?;

    if format == OutputFormat::Csvs && destination.exists() && !destination.is_dir() {
        return Err(FryconvError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!(
                "csvs destination {:?} exists and is not a directory",
                destination
            ),
        )));
    }

    make_parent_dirs(destination)?;

    let staged = staging_path(destination);
    // stale leftovers from an interrupted run
    discard_staged(&staged);

    info!(
        "writing {} output for {} cells × {} genes",
        format,
        matrix.n_obs(),
        matrix.n_vars()
    );

    let result = match format {
        OutputFormat::H5ad => write_h5ad(matrix, &staged),
        OutputFormat::Loom => write_loom(matrix, &staged),
        OutputFormat::Csvs => write_csvs(matrix, &staged),
        OutputFormat::Zarr => write_zarr(matrix, &staged),
    };

    match result {
        Ok(()) => {
            promote_staged(&staged, destination)?;
            info!("wrote {} output to {:?}", format, destination);
            Ok(())
        }
        Err(err) => {
            discard_staged(&staged);
            Err(err)
        }
    }
}

fn write_h5ad(matrix: &AnnotatedMatrix, path: &Path) -> Result<()> {
    let adata = AnnData::<H5>::new(path)?;
    adata.set_x(matrix.x.clone())?;
    for (name, layer) in &matrix.layers {
        adata.layers().add(name, layer.clone())?;
    }
    adata.set_obs_names(matrix.obs_names.iter().cloned().collect::<DataFrameIndex>())?;
    adata.set_var_names(matrix.var_names.iter().cloned().collect::<DataFrameIndex>())?;
    Ok(())
}

fn write_zarr(matrix: &AnnotatedMatrix, path: &Path) -> Result<()> {
    let adata = AnnData::<Zarr>::new(path)?;
    adata.set_x(matrix.x.clone())?;
    for (name, layer) in &matrix.layers {
        adata.layers().add(name, layer.clone())?;
    }
    adata.set_obs_names(matrix.obs_names.iter().cloned().collect::<DataFrameIndex>())?;
    adata.set_var_names(matrix.var_names.iter().cloned().collect::<DataFrameIndex>())?;
    Ok(())
}

fn write_loom(matrix: &AnnotatedMatrix, path: &Path) -> Result<()> {
    let file = hdf5::File::create(path)?;

    // loom stores genes as rows and cells as columns
    let dense = dense_transposed(&matrix.x);
    file.new_dataset_builder().with_data(&dense).create("matrix")?;

    let layers_group = file.create_group("layers")?;
    for (name, layer) in &matrix.layers {
        let dense = dense_transposed(layer);
        layers_group
            .new_dataset_builder()
            .with_data(&dense)
            .create(name.as_str())?;
    }

    let row_attrs = file.create_group("row_attrs")?;
    let var_names = unicode_column(&matrix.var_names)?;
    row_attrs
        .new_dataset_builder()
        .with_data(&var_names)
        .create("var_names")?;

    let col_attrs = file.create_group("col_attrs")?;
    let obs_names = unicode_column(&matrix.obs_names)?;
    col_attrs
        .new_dataset_builder()
        .with_data(&obs_names)
        .create("obs_names")?;

    file.create_group("row_graphs")?;
    file.create_group("col_graphs")?;

    let attrs = file.create_group("attrs")?;
    let spec_version = unicode_column(&["3.0.0".to_string()])?;
    attrs
        .new_dataset_builder()
        .with_data(&spec_version)
        .create("LOOM_SPEC_VERSION")?;

    Ok(())
}

fn write_csvs(matrix: &AnnotatedMatrix, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;

    write_name_column(&dir.join("obs.csv"), "obs_names", &matrix.obs_names)?;
    write_name_column(&dir.join("var.csv"), "var_names", &matrix.var_names)?;
    write_dense_csv(&dir.join("X.csv"), &matrix.x)?;
    for (name, layer) in &matrix.layers {
        write_dense_csv(&dir.join(format!("{}.csv", name)), layer)?;
    }
    Ok(())
}

fn write_name_column(path: &Path, header: &str, values: &[String]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([header])?;
    for value in values {
        writer.write_record([value.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_dense_csv(path: &Path, matrix: &CsrMatrix<f32>) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let ncols = matrix.ncols();
    if ncols > 0 {
        let dense = SparseOps::to_dense(matrix);
        let mut record = Vec::with_capacity(ncols);
        for row in dense.chunks(ncols) {
            record.clear();
            record.extend(row.iter().map(|value| value.to_string()));
            writer.write_record(&record)?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn dense_transposed(matrix: &CsrMatrix<f32>) -> Array2<f32> {
    let mut dense = Array2::<f32>::zeros((matrix.ncols(), matrix.nrows()));
    for (row, col, &value) in matrix.triplet_iter() {
        dense[(col, row)] = value;
    }
    dense
}

fn unicode_column(values: &[String]) -> Result<Vec<VarLenUnicode>> {
    values
        .iter()
        .map(|value| {
            value.parse::<VarLenUnicode>().map_err(|e| {
                FryconvError::Parse(format!("cannot encode {:?} as an HDF5 string: {}", value, e))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_matrix() -> AnnotatedMatrix {
        AnnotatedMatrix {
            x: SparseOps::from_triplets(2, 2, vec![(0, 0, 5.0), (1, 1, 3.0)]).unwrap(),
            layers: vec![(
                "unspliced".to_string(),
                SparseOps::from_triplets(2, 2, vec![(0, 1, 2.0)]).unwrap(),
            )],
            obs_names: vec!["AAAC".to_string(), "GGGT".to_string()],
            var_names: vec!["g1".to_string(), "g2".to_string()],
        }
    }

    #[test]
    fn format_parsing_is_closed() {
        assert_eq!("h5ad".parse::<OutputFormat>().unwrap(), OutputFormat::H5ad);
        assert_eq!("loom".parse::<OutputFormat>().unwrap(), OutputFormat::Loom);
        assert_eq!("csvs".parse::<OutputFormat>().unwrap(), OutputFormat::Csvs);
        assert_eq!("zarr".parse::<OutputFormat>().unwrap(), OutputFormat::Zarr);
        assert!(matches!(
            "h5".parse::<OutputFormat>(),
            Err(FryconvError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            "H5AD".parse::<OutputFormat>(),
            Err(FryconvError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn csvs_writes_one_file_per_layer() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("converted");
        serialize(&small_matrix(), &dest, OutputFormat::Csvs).unwrap();

        assert!(dest.is_dir());
        for name in ["obs.csv", "var.csv", "X.csv", "unspliced.csv"] {
            assert!(dest.join(name).is_file(), "missing {}", name);
        }
        assert!(!staging_path(&dest).exists());

        let x = std::fs::read_to_string(dest.join("X.csv")).unwrap();
        assert_eq!(x, "5,0\n0,3\n");
    }

    #[test]
    fn csvs_refuses_a_non_directory_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("converted");
        std::fs::write(&dest, "occupied").unwrap();

        let err = serialize(&small_matrix(), &dest, OutputFormat::Csvs);
        assert!(err.is_err());
        // the occupying file is untouched and no fragments appear
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "occupied");
        assert!(!staging_path(&dest).exists());
        assert_eq!(
            std::fs::read_dir(dir.path()).unwrap().count(),
            1,
            "no stray output fragments"
        );
    }

    #[test]
    fn dense_transposed_flips_axes() {
        let m = SparseOps::from_triplets(2, 3, vec![(0, 2, 7.0), (1, 0, 1.0)]).unwrap();
        let t = dense_transposed(&m);
        assert_eq!(t.shape(), &[3, 2]);
        assert_eq!(t[(2, 0)], 7.0);
        assert_eq!(t[(0, 1)], 1.0);
    }
}
