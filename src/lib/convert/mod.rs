//! Conversion of quantification results into annotated output containers
//!
//! The modules in here cover the whole conversion path:
//! - [`structure`]: output-structure requests, presets, and their resolution
//! - [`loader`]: reading quantification directories into component counts
//! - [`assemble`]: descriptor-driven assembly of the annotated matrix
//! - [`remap`]: gene id to gene name projection
//! - [`output`]: container writers and format dispatch

pub mod assemble;
pub mod loader;
pub mod output;
pub mod remap;
pub mod structure;

pub use assemble::{assemble, assemble_unstructured, AnnotatedMatrix};
pub use loader::{load_quant_dir, ComponentCounts, MetaInfo};
pub use output::{serialize, OutputFormat};
pub use remap::{remap, GeneIdNameMap};
pub use structure::{
    resolve, Component, ComponentSet, Preset, StructureDescriptor, StructureRequest,
};
