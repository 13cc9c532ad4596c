use fryconv_lib::convert::{OutputFormat, StructureRequest};
use std::path::PathBuf;
use structopt::StructOpt;

/// Arguments for the `convert` command.
#[derive(Debug, Clone, StructOpt)]
#[structopt(
    name = "convert",
    about = "Convert an alevin-fry quantification result to another format"
)]
pub struct ConvertArgs {
    /// Path to the quantification directory containing the matrix to convert.
    #[structopt(short, long, parse(from_os_str))]
    pub quant_dir: PathBuf,

    /// Output path. A directory for `csvs`; a single file or container otherwise.
    #[structopt(short, long, parse(from_os_str))]
    pub output: PathBuf,

    /// The structure U, S, and A counts should occupy in the output matrix:
    /// a preset (raw, scRNA, snRNA, velocity, S+A, U+S+A, all) or a JSON
    /// mapping from layer name to component tags, e.g. '{"X": ["S","A"]}'.
    #[structopt(long = "output-structure", default_value = "scRNA")]
    pub output_structure: StructureRequest,

    /// The format in which the output should be written.
    #[structopt(long = "output-format", default_value = "h5ad")]
    pub output_format: OutputFormat,

    /// A two-column tab-separated list of gene id to gene name mappings.
    /// Providing this file projects gene ids to gene names in the output.
    #[structopt(long = "geneid-to-name", parse(from_os_str))]
    pub geneid_to_name: Option<PathBuf>,
}
