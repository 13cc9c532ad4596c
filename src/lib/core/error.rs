//! Error types for the fryconv library

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FryconvError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("AnnData error: {0}")]
    AnnData(#[from] anyhow::Error),

    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid output structure: {0}")]
    InvalidStructure(String),

    #[error("output structure references component {component}, but the quantification only produced {{{available}}}")]
    UnavailableComponent { component: char, available: String },

    #[error("component matrices are not conformant: expected {expected}, got {actual}")]
    MisalignedComponents { expected: String, actual: String },

    #[error("unsupported output format {0:?} (expected h5ad, loom, csvs, or zarr)")]
    UnsupportedFormat(String),

    #[error("missing file: {0:?}")]
    MissingFile(PathBuf),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("sparse matrix error: {0}")]
    SparseMatrix(String),
}

pub type Result<T> = std::result::Result<T, FryconvError>;

impl From<nalgebra_sparse::SparseFormatError> for FryconvError {
    fn from(err: nalgebra_sparse::SparseFormatError) -> Self {
        FryconvError::SparseMatrix(format!("sparse format error: {:?}", err))
    }
}

/// Returns `true` if the error originated from a broken pipe.
#[inline]
pub fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.root_cause()
        .downcast_ref::<io::Error>()
        .map(|io_err| io_err.kind() == io::ErrorKind::BrokenPipe)
        .unwrap_or(false)
}
