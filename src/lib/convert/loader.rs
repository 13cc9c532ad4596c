//! Loading of quantification directories produced by the upstream counter
//!
//! The directory layout follows the alevin-fry convention: `meta_info.json`
//! next to an `alevin/` directory holding the MatrixMarket count matrix and
//! its barcode/gene sidecar files. In USA mode the matrix columns come in
//! three equally sized blocks, spliced first, then unspliced, then ambiguous.

use crate::convert::structure::{Component, ComponentSet};
use crate::core::error::{FryconvError, Result};
use crate::core::io::{open_text_reader, read_lines};
use crate::core::sparse::SparseOps;
use log::info;
use nalgebra_sparse::CsrMatrix;
use rayon::prelude::*;
use serde::Deserialize;
use std::fs::File;
use std::io::BufRead;
use std::path::{Path, PathBuf};

/// Quantifier metadata recorded alongside the matrix.
#[derive(Debug, Clone, Deserialize)]
pub struct MetaInfo {
    /// Total number of matrix columns (gene × status columns in USA mode).
    pub num_genes: usize,
    /// Whether counts are split into unspliced/spliced/ambiguous components.
    pub usa_mode: bool,
}

impl MetaInfo {
    pub fn from_quant_dir(quant_dir: &Path) -> Result<Self> {
        let path = quant_dir.join("meta_info.json");
        if !path.is_file() {
            return Err(FryconvError::MissingFile(path));
        }
        let file = File::open(&path)?;
        serde_json::from_reader(file).map_err(|e| {
            FryconvError::Parse(format!("invalid meta_info.json in {:?}: {}", quant_dir, e))
        })
    }

    /// Components the quantification actually produced.
    pub fn availability(&self) -> ComponentSet {
        if self.usa_mode {
            [
                Component::Unspliced,
                Component::Spliced,
                Component::Ambiguous,
            ]
            .into_iter()
            .collect()
        } else {
            [Component::Spliced].into_iter().collect()
        }
    }
}

/// Per-component cell-by-gene count matrices sharing one barcode and gene
/// index. Matrices for absent components are simply not populated.
#[derive(Debug, Clone)]
pub struct ComponentCounts {
    pub barcodes: Vec<String>,
    pub gene_ids: Vec<String>,
    pub usa_mode: bool,
    unspliced: Option<CsrMatrix<f32>>,
    spliced: Option<CsrMatrix<f32>>,
    ambiguous: Option<CsrMatrix<f32>>,
}

impl ComponentCounts {
    pub fn get(&self, component: Component) -> Option<&CsrMatrix<f32>> {
        match component {
            Component::Unspliced => self.unspliced.as_ref(),
            Component::Spliced => self.spliced.as_ref(),
            Component::Ambiguous => self.ambiguous.as_ref(),
        }
    }

    pub fn availability(&self) -> ComponentSet {
        [
            Component::Unspliced,
            Component::Spliced,
            Component::Ambiguous,
        ]
        .into_iter()
        .filter(|&component| self.get(component).is_some())
        .collect()
    }

    pub fn n_cells(&self) -> usize {
        self.barcodes.len()
    }

    pub fn n_genes(&self) -> usize {
        self.gene_ids.len()
    }

    #[cfg(test)]
    pub(crate) fn for_tests(
        barcodes: Vec<String>,
        gene_ids: Vec<String>,
        unspliced: Option<CsrMatrix<f32>>,
        spliced: Option<CsrMatrix<f32>>,
        ambiguous: Option<CsrMatrix<f32>>,
    ) -> Self {
        Self {
            barcodes,
            gene_ids,
            usa_mode: true,
            unspliced,
            spliced,
            ambiguous,
        }
    }
}

/// Load the count matrix and its sidecar files from a quantification
/// directory.
pub fn load_quant_dir(quant_dir: &Path, meta: &MetaInfo) -> Result<ComponentCounts> {
    let alevin_dir = quant_dir.join("alevin");
    let mtx_path = existing_variant(&alevin_dir, "quants_mat.mtx")?;
    let rows_path = existing_variant(&alevin_dir, "quants_mat_rows.txt")?;
    let cols_path = existing_variant(&alevin_dir, "quants_mat_cols.txt")?;

    let barcodes = read_lines(&rows_path)?;
    let column_labels = read_lines(&cols_path)?;

    let (nrows, ncols, mut triplets) = read_matrix_market(&mtx_path)?;

    if nrows != barcodes.len() {
        return Err(FryconvError::Parse(format!(
            "matrix has {} rows but {:?} lists {} barcodes",
            nrows,
            rows_path,
            barcodes.len()
        )));
    }
    if ncols != meta.num_genes {
        return Err(FryconvError::Parse(format!(
            "matrix has {} columns but meta_info.json declares {} genes",
            ncols, meta.num_genes
        )));
    }

    triplets.par_sort_unstable_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

    if meta.usa_mode {
        if ncols % 3 != 0 {
            return Err(FryconvError::Parse(format!(
                "USA-mode matrix has {} columns, which is not divisible by 3",
                ncols
            )));
        }
        let num_genes = ncols / 3;

        let gene_ids = match column_labels.len() {
            n if n == num_genes => column_labels,
            n if n == ncols => column_labels.into_iter().take(num_genes).collect(),
            n => {
                return Err(FryconvError::Parse(format!(
                    "{:?} lists {} genes, expected {} or {}",
                    cols_path, n, num_genes, ncols
                )));
            }
        };

        // column blocks in upstream order: spliced, unspliced, ambiguous
        let mut spliced = Vec::new();
        let mut unspliced = Vec::new();
        let mut ambiguous = Vec::new();
        for (row, col, value) in triplets {
            let gene = col % num_genes;
            match col / num_genes {
                0 => spliced.push((row, gene, value)),
                1 => unspliced.push((row, gene, value)),
                _ => ambiguous.push((row, gene, value)),
            }
        }

        let counts = ComponentCounts {
            barcodes,
            gene_ids,
            usa_mode: true,
            unspliced: Some(SparseOps::from_triplets(nrows, num_genes, unspliced)?),
            spliced: Some(SparseOps::from_triplets(nrows, num_genes, spliced)?),
            ambiguous: Some(SparseOps::from_triplets(nrows, num_genes, ambiguous)?),
        };
        info!(
            "loaded USA-mode quantification: {} cells × {} genes",
            counts.n_cells(),
            counts.n_genes()
        );
        Ok(counts)
    } else {
        if column_labels.len() != ncols {
            return Err(FryconvError::Parse(format!(
                "{:?} lists {} genes but the matrix has {} columns",
                cols_path,
                column_labels.len(),
                ncols
            )));
        }
        let counts = ComponentCounts {
            barcodes,
            gene_ids: column_labels,
            usa_mode: false,
            unspliced: None,
            spliced: Some(SparseOps::from_triplets(nrows, ncols, triplets)?),
            ambiguous: None,
        };
        info!(
            "loaded quantification: {} cells × {} genes",
            counts.n_cells(),
            counts.n_genes()
        );
        Ok(counts)
    }
}

/// Locate a file that may or may not be gzip-compressed.
fn existing_variant(dir: &Path, name: &str) -> Result<PathBuf> {
    let plain = dir.join(name);
    if plain.is_file() {
        return Ok(plain);
    }
    let gz = dir.join(format!("{}.gz", name));
    if gz.is_file() {
        return Ok(gz);
    }
    Err(FryconvError::MissingFile(plain))
}

/// Parse a MatrixMarket coordinate file into 0-based triplets.
fn read_matrix_market(path: &Path) -> Result<(usize, usize, Vec<(usize, usize, f32)>)> {
    let reader = open_text_reader(path)?;
    let mut lines = reader.lines();

    let banner = loop {
        match lines.next() {
            Some(line) => {
                let line = line?;
                if !line.trim().is_empty() {
                    break line;
                }
            }
            None => {
                return Err(FryconvError::Parse(format!("{:?} is empty", path)));
            }
        }
    };
    if !banner.starts_with("%%MatrixMarket") || !banner.contains("coordinate") {
        return Err(FryconvError::Parse(format!(
            "{:?} is not a MatrixMarket coordinate file (banner {:?})",
            path, banner
        )));
    }

    let dims = loop {
        match lines.next() {
            Some(line) => {
                let line = line?;
                let trimmed = line.trim();
                if trimmed.is_empty() || trimmed.starts_with('%') {
                    continue;
                }
                break trimmed.to_string();
            }
            None => {
                return Err(FryconvError::Parse(format!(
                    "{:?} has no dimension header",
                    path
                )));
            }
        }
    };

    let mut fields = dims.split_whitespace();
    let (nrows, ncols, nnz) = match (fields.next(), fields.next(), fields.next()) {
        (Some(r), Some(c), Some(n)) => {
            let parse = |s: &str| {
                s.parse::<usize>().map_err(|_| {
                    FryconvError::Parse(format!("bad dimension header {:?} in {:?}", dims, path))
                })
            };
            (parse(r)?, parse(c)?, parse(n)?)
        }
        _ => {
            return Err(FryconvError::Parse(format!(
                "bad dimension header {:?} in {:?}",
                dims, path
            )));
        }
    };

    let mut triplets = Vec::with_capacity(nnz);
    for line in lines {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('%') {
            continue;
        }

        let mut fields = trimmed.split_whitespace();
        let entry = match (fields.next(), fields.next(), fields.next()) {
            (Some(r), Some(c), Some(v)) => {
                let row = r.parse::<usize>().ok();
                let col = c.parse::<usize>().ok();
                let value = v.parse::<f32>().ok();
                match (row, col, value) {
                    (Some(row), Some(col), Some(value)) if row >= 1 && col >= 1 => {
                        (row - 1, col - 1, value)
                    }
                    _ => {
                        return Err(FryconvError::Parse(format!(
                            "bad matrix entry {:?} in {:?}",
                            trimmed, path
                        )));
                    }
                }
            }
            _ => {
                return Err(FryconvError::Parse(format!(
                    "bad matrix entry {:?} in {:?}",
                    trimmed, path
                )));
            }
        };
        triplets.push(entry);
    }

    if triplets.len() != nnz {
        return Err(FryconvError::Parse(format!(
            "{:?} declares {} entries but contains {}",
            path,
            nnz,
            triplets.len()
        )));
    }

    Ok((nrows, ncols, triplets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_quant_dir(usa_mode: bool) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let alevin = dir.path().join("alevin");
        fs::create_dir(&alevin).unwrap();

        fs::write(
            dir.path().join("meta_info.json"),
            format!(
                r#"{{"num_genes": {}, "usa_mode": {}, "alt_resolved_cell_numbers": []}}"#,
                if usa_mode { 6 } else { 2 },
                usa_mode
            ),
        )
        .unwrap();

        fs::write(alevin.join("quants_mat_rows.txt"), "AAAC\nGGGT\n").unwrap();
        fs::write(alevin.join("quants_mat_cols.txt"), "g1\ng2\n").unwrap();

        if usa_mode {
            // columns: g1-S g2-S g1-U g2-U g1-A g2-A
            fs::write(
                alevin.join("quants_mat.mtx"),
                "%%MatrixMarket matrix coordinate real general\n\
                 % produced upstream\n\
                 2 6 4\n\
                 1 1 5.0\n\
                 1 3 2.0\n\
                 2 6 1.0\n\
                 2 2 3.0\n",
            )
            .unwrap();
        } else {
            fs::write(
                alevin.join("quants_mat.mtx"),
                "%%MatrixMarket matrix coordinate real general\n2 2 2\n1 1 5.0\n2 2 3.0\n",
            )
            .unwrap();
        }

        dir
    }

    #[test]
    fn loads_usa_mode_directory_with_component_split() {
        let dir = write_quant_dir(true);
        let meta = MetaInfo::from_quant_dir(dir.path()).unwrap();
        assert!(meta.usa_mode);
        assert_eq!(meta.num_genes, 6);

        let counts = load_quant_dir(dir.path(), &meta).unwrap();
        assert_eq!(counts.barcodes, vec!["AAAC", "GGGT"]);
        assert_eq!(counts.gene_ids, vec!["g1", "g2"]);

        let spliced = counts.get(Component::Spliced).unwrap();
        let unspliced = counts.get(Component::Unspliced).unwrap();
        let ambiguous = counts.get(Component::Ambiguous).unwrap();
        assert_eq!(SparseOps::to_dense(spliced), vec![5.0, 0.0, 0.0, 3.0]);
        assert_eq!(SparseOps::to_dense(unspliced), vec![2.0, 0.0, 0.0, 0.0]);
        assert_eq!(SparseOps::to_dense(ambiguous), vec![0.0, 0.0, 0.0, 1.0]);

        assert_eq!(counts.availability().len(), 3);
    }

    #[test]
    fn loads_plain_directory_as_single_component() {
        let dir = write_quant_dir(false);
        let meta = MetaInfo::from_quant_dir(dir.path()).unwrap();
        let counts = load_quant_dir(dir.path(), &meta).unwrap();

        assert!(!counts.usa_mode);
        assert!(counts.get(Component::Unspliced).is_none());
        assert_eq!(
            SparseOps::to_dense(counts.get(Component::Spliced).unwrap()),
            vec![5.0, 0.0, 0.0, 3.0]
        );
    }

    #[test]
    fn missing_meta_info_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = MetaInfo::from_quant_dir(dir.path());
        assert!(matches!(err, Err(FryconvError::MissingFile(_))));
    }

    #[test]
    fn truncated_matrix_is_a_parse_error() {
        let dir = write_quant_dir(true);
        fs::write(
            dir.path().join("alevin/quants_mat.mtx"),
            "%%MatrixMarket matrix coordinate real general\n2 6 4\n1 1 5.0\n",
        )
        .unwrap();
        let meta = MetaInfo::from_quant_dir(dir.path()).unwrap();
        let err = load_quant_dir(dir.path(), &meta);
        assert!(matches!(err, Err(FryconvError::Parse(_))));
    }

    #[test]
    fn barcode_count_mismatch_is_a_parse_error() {
        let dir = write_quant_dir(true);
        fs::write(dir.path().join("alevin/quants_mat_rows.txt"), "AAAC\n").unwrap();
        let meta = MetaInfo::from_quant_dir(dir.path()).unwrap();
        let err = load_quant_dir(dir.path(), &meta);
        assert!(matches!(err, Err(FryconvError::Parse(_))));
    }
}
