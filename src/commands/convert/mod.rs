mod args;

pub use args::ConvertArgs;

use anyhow::Result;
use fryconv_lib::convert::{
    assemble, assemble_unstructured, load_quant_dir, remap, resolve, serialize, GeneIdNameMap,
    MetaInfo,
};
use fryconv_lib::core::error::FryconvError;
use log::info;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct UnmappedReport<'a> {
    unmapped_geneids: &'a [String],
}

/// Entry point for the `convert` command.
///
/// Stages run in a fixed order: validate, load, assemble, remap (when a gene
/// id map is given), serialize. The first failure aborts the request and no
/// primary output is produced.
pub fn run_convert(args: ConvertArgs) -> Result<()> {
    info!("starting conversion of {:?}", args.quant_dir);

    let meta = MetaInfo::from_quant_dir(&args.quant_dir)?;
    let availability = meta.availability();

    let descriptor = if meta.usa_mode {
        Some(resolve(&args.output_structure, &availability)?)
    } else {
        info!("quantification is not in USA mode; the output structure is ignored");
        None
    };

    if let Some(path) = &args.geneid_to_name {
        if !path.is_file() {
            return Err(FryconvError::MissingFile(path.clone()).into());
        }
    }

    let counts = load_quant_dir(&args.quant_dir, &meta)?;

    let matrix = match &descriptor {
        Some(descriptor) => assemble(&counts, descriptor)?,
        None => assemble_unstructured(&counts)?,
    };

    let matrix = match &args.geneid_to_name {
        Some(path) => {
            let map = GeneIdNameMap::from_path(path)?;
            info!(
                "loaded {} gene id to name mapping(s) from {:?}",
                map.len(),
                path
            );
            let (matrix, unmapped) = remap(matrix, &map)?;
            if !unmapped.is_empty() {
                let report_path = unmapped_report_path(&args.output);
                info!(
                    "writing {} unmapped gene id(s) to {:?}",
                    unmapped.len(),
                    report_path
                );
                write_unmapped_report(&report_path, &unmapped)?;
            }
            matrix
        }
        None => matrix,
    };

    serialize(&matrix, &args.output, args.output_format)?;

    info!("conversion finished: {:?}", args.output);
    Ok(())
}

fn unmapped_report_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push("_unmapped_ids.json");
    output.with_file_name(name)
}

fn write_unmapped_report(path: &Path, unmapped: &[String]) -> Result<()> {
    let file = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(
        file,
        &UnmappedReport {
            unmapped_geneids: unmapped,
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_report_sits_next_to_the_output() {
        assert_eq!(
            unmapped_report_path(Path::new("/data/out.h5ad")),
            PathBuf::from("/data/out.h5ad_unmapped_ids.json")
        );
        assert_eq!(
            unmapped_report_path(Path::new("out")),
            PathBuf::from("out_unmapped_ids.json")
        );
    }
}
