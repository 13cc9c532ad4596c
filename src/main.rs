//! fryconv - single-cell quantification converter
//!
//! fryconv re-materializes quantification results produced by alevin-fry
//! into common array containers. A configurable output structure controls
//! how the unspliced (U), spliced (S), and ambiguous (A) count components
//! are combined into named layers of the cell-by-gene matrix.
//!
//! # Usage
//!
//! ```bash
//! # spliced + ambiguous as the X matrix, written as h5ad
//! fryconv convert --quant-dir quant --output counts.h5ad
//!
//! # RNA velocity layout with gene names instead of ids
//! fryconv convert --quant-dir quant --output counts.h5ad \
//!     --output-structure velocity --geneid-to-name t2g.tsv
//!
//! # a user-defined structure, written as one CSV per layer
//! fryconv convert --quant-dir quant --output counts \
//!     --output-structure '{"X": ["S","A"], "unspliced": ["U"]}' \
//!     --output-format csvs
//! ```

extern crate fryconv_lib;
pub mod commands;
use anyhow::Result;
use env_logger::Env;
use fryconv_lib::core::error::is_broken_pipe;
use log::*;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case", author, about)]
/// Commands for re-materializing single-cell quantification results
struct Args {
    #[structopt(subcommand)]
    subcommand: Subcommand,
}

#[derive(StructOpt)]
enum Subcommand {
    /// Convert an alevin-fry quantification result to another format
    Convert(commands::ConvertArgs),
}

impl Subcommand {
    fn run(self) -> Result<()> {
        match self {
            Subcommand::Convert(args) => commands::run_convert(args)?,
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    if let Err(err) = Args::from_args().subcommand.run() {
        if is_broken_pipe(&err) {
            std::process::exit(0);
        }
        error!("{}", err);
        std::process::exit(1);
    }
    Ok(())
}
