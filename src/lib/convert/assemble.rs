//! Assembly of annotated matrices from per-component counts

use crate::convert::loader::ComponentCounts;
use crate::convert::structure::{Component, StructureDescriptor};
use crate::core::error::{FryconvError, Result};
use crate::core::sparse::SparseOps;
use log::info;
use nalgebra_sparse::CsrMatrix;

/// Cell-by-gene matrix with one primary layer and zero or more named
/// auxiliary layers, all sharing shape and indices.
#[derive(Debug, Clone)]
pub struct AnnotatedMatrix {
    pub x: CsrMatrix<f32>,
    pub layers: Vec<(String, CsrMatrix<f32>)>,
    pub obs_names: Vec<String>,
    pub var_names: Vec<String>,
}

impl AnnotatedMatrix {
    pub fn n_obs(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_vars(&self) -> usize {
        self.x.ncols()
    }

    /// Verify that every layer shares the primary layer's shape and that the
    /// index vectors match the matrix dimensions.
    pub fn validate_dimensions(&self) -> Result<()> {
        if self.obs_names.len() != self.n_obs() {
            return Err(FryconvError::MisalignedComponents {
                expected: format!("{} obs names", self.n_obs()),
                actual: format!("{} obs names", self.obs_names.len()),
            });
        }
        if self.var_names.len() != self.n_vars() {
            return Err(FryconvError::MisalignedComponents {
                expected: format!("{} var names", self.n_vars()),
                actual: format!("{} var names", self.var_names.len()),
            });
        }
        for (name, layer) in &self.layers {
            if layer.nrows() != self.n_obs() || layer.ncols() != self.n_vars() {
                return Err(FryconvError::MisalignedComponents {
                    expected: format!("{}×{}", self.n_obs(), self.n_vars()),
                    actual: format!("{}×{} for layer {:?}", layer.nrows(), layer.ncols(), name),
                });
            }
        }
        Ok(())
    }
}

/// Build the annotated matrix dictated by a resolved structure descriptor.
///
/// Each descriptor layer is the element-wise sum of its component matrices;
/// the first layer becomes the primary one. Component matrices must be
/// conformant, which the loader guarantees by construction.
pub fn assemble(
    counts: &ComponentCounts,
    descriptor: &StructureDescriptor,
) -> Result<AnnotatedMatrix> {
    check_conformant(counts)?;

    let mut assembled: Vec<(String, CsrMatrix<f32>)> =
        Vec::with_capacity(descriptor.layers().len());
    for (name, components) in descriptor.layers() {
        let mut summed: Option<CsrMatrix<f32>> = None;
        for component in components {
            let matrix = counts.get(*component).ok_or_else(|| {
                FryconvError::UnavailableComponent {
                    component: component.tag(),
                    available: counts
                        .availability()
                        .iter()
                        .map(|c| c.tag().to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                }
            })?;
            summed = Some(match summed {
                None => matrix.clone(),
                Some(acc) => SparseOps::add_matrices(&acc, matrix)?,
            });
        }
        let matrix = summed.ok_or_else(|| {
            FryconvError::InvalidStructure(format!("layer {:?} has no components", name))
        })?;
        assembled.push((name.clone(), matrix));
    }

    let mut iter = assembled.into_iter();
    let (primary_name, x) = iter.next().ok_or_else(|| {
        FryconvError::InvalidStructure("the structure resolved to zero layers".to_string())
    })?;
    let layers: Vec<(String, CsrMatrix<f32>)> = iter.collect();

    info!(
        "assembled primary layer {:?} plus {} auxiliary layer(s)",
        primary_name,
        layers.len()
    );

    let matrix = AnnotatedMatrix {
        x,
        layers,
        obs_names: counts.barcodes.clone(),
        var_names: counts.gene_ids.clone(),
    };
    matrix.validate_dimensions()?;
    Ok(matrix)
}

/// Wrap a single-matrix quantification without structure-driven assembly.
/// Used for inputs that were not quantified in USA mode.
pub fn assemble_unstructured(counts: &ComponentCounts) -> Result<AnnotatedMatrix> {
    let x = counts
        .get(Component::Spliced)
        .ok_or_else(|| {
            FryconvError::MisalignedComponents {
                expected: "a count matrix".to_string(),
                actual: "no quantified component".to_string(),
            }
        })?
        .clone();

    let matrix = AnnotatedMatrix {
        x,
        layers: Vec::new(),
        obs_names: counts.barcodes.clone(),
        var_names: counts.gene_ids.clone(),
    };
    matrix.validate_dimensions()?;
    Ok(matrix)
}

fn check_conformant(counts: &ComponentCounts) -> Result<()> {
    let mut shape: Option<(usize, usize)> = None;
    for component in [
        Component::Unspliced,
        Component::Spliced,
        Component::Ambiguous,
    ] {
        if let Some(matrix) = counts.get(component) {
            let dims = (matrix.nrows(), matrix.ncols());
            match shape {
                None => shape = Some(dims),
                Some(expected) if expected != dims => {
                    return Err(FryconvError::MisalignedComponents {
                        expected: format!("{}×{}", expected.0, expected.1),
                        actual: format!(
                            "{}×{} for component {}",
                            dims.0,
                            dims.1,
                            component.tag()
                        ),
                    });
                }
                Some(_) => {}
            }
        }
    }
    Ok(())
}
