//! fryconv: re-materialize single-cell quantification results
//!
//! The library interprets alevin-fry-style quantification directories and
//! rebuilds them as annotated cell-by-gene matrices. A configurable output
//! structure controls how the raw unspliced (U), spliced (S), and ambiguous
//! (A) count components are combined into named layers; the result can be
//! written as `h5ad`, `loom`, `csvs`, or `zarr`.
//!
//! # Modules
//!
//! - [`convert`]: structure resolution, loading, assembly, gene-name
//!   remapping, and container serialization
//! - [`core`]: shared error, filesystem, IO, and sparse-matrix helpers

pub mod convert;
pub mod core;
