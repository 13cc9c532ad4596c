//! Gene identifier to gene name projection

use crate::convert::assemble::AnnotatedMatrix;
use crate::core::error::{FryconvError, Result};
use crate::core::io::get_tsv_reader;
use crate::core::sparse::SparseOps;
use log::info;
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::Path;

/// Mapping from gene identifier to gene name.
#[derive(Debug, Clone, Default)]
pub struct GeneIdNameMap {
    names: FxHashMap<String, String>,
}

impl GeneIdNameMap {
    /// Load a two-column tab-separated mapping file with no header.
    /// Duplicate identifiers keep the last name seen.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(FryconvError::MissingFile(path.to_path_buf()));
        }

        let mut reader = get_tsv_reader(path, false)?;
        let mut names = FxHashMap::default();
        for (line_no, record) in reader.records().enumerate() {
            let record = record?;
            match (record.get(0), record.get(1)) {
                (Some(id), Some(name)) if !id.is_empty() => {
                    names.insert(id.to_string(), name.to_string());
                }
                _ => {
                    return Err(FryconvError::Parse(format!(
                        "line {} of {:?} does not hold two tab-separated columns",
                        line_no + 1,
                        path
                    )));
                }
            }
        }
        Ok(Self { names })
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Project gene identifiers to names.
///
/// Columns without a mapped name are dropped from every layer and returned
/// in original column order; surviving columns are renamed and the result is
/// deduplicated so output names are unique.
pub fn remap(
    matrix: AnnotatedMatrix,
    map: &GeneIdNameMap,
) -> Result<(AnnotatedMatrix, Vec<String>)> {
    let mut keep_indices = Vec::with_capacity(matrix.var_names.len());
    let mut mapped_names = Vec::with_capacity(matrix.var_names.len());
    let mut unmapped = Vec::new();

    for (idx, id) in matrix.var_names.iter().enumerate() {
        match map.get(id) {
            Some(name) => {
                keep_indices.push(idx);
                mapped_names.push(name.to_string());
            }
            None => unmapped.push(id.clone()),
        }
    }

    let x = SparseOps::filter_columns(&matrix.x, &keep_indices)?;
    let mut layers = Vec::with_capacity(matrix.layers.len());
    for (name, layer) in &matrix.layers {
        layers.push((name.clone(), SparseOps::filter_columns(layer, &keep_indices)?));
    }

    let remapped = AnnotatedMatrix {
        x,
        layers,
        obs_names: matrix.obs_names,
        var_names: make_unique(mapped_names),
    };
    remapped.validate_dimensions()?;

    if !unmapped.is_empty() {
        info!("there were {} gene ids without a mapped name", unmapped.len());
    }

    Ok((remapped, unmapped))
}

/// Disambiguate duplicate names with a stable `-k` occurrence suffix, in
/// original column order. The first occurrence keeps the bare name;
/// occurrence `k` becomes `name-k`, advancing past any taken candidate.
fn make_unique(names: Vec<String>) -> Vec<String> {
    let mut occurrences: FxHashMap<String, usize> = FxHashMap::default();
    let mut taken: FxHashSet<String> = FxHashSet::default();
    let mut unique = Vec::with_capacity(names.len());

    for name in names {
        let count = occurrences.get(&name).copied().unwrap_or(0);
        let assigned = if count == 0 && !taken.contains(&name) {
            name.clone()
        } else {
            let mut k = count.max(1);
            loop {
                let candidate = format!("{}-{}", name, k);
                if !taken.contains(&candidate) {
                    break candidate;
                }
                k += 1;
            }
        };
        occurrences.insert(name, count + 1);
        taken.insert(assigned.clone());
        unique.push(assigned);
    }

    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::loader::ComponentCounts;
    use crate::convert::structure::{resolve, Component, ComponentSet, StructureRequest};
    use std::fs;

    fn matrix_with_genes(gene_ids: &[&str]) -> AnnotatedMatrix {
        let ncols = gene_ids.len();
        let triplets: Vec<(usize, usize, f32)> =
            (0..ncols).map(|col| (0, col, (col + 1) as f32)).collect();
        let counts = ComponentCounts::for_tests(
            vec!["AAAC".to_string()],
            gene_ids.iter().map(|g| g.to_string()).collect(),
            None,
            Some(SparseOps::from_triplets(1, ncols, triplets.clone()).unwrap()),
            Some(SparseOps::from_triplets(1, ncols, triplets).unwrap()),
        );
        let availability: ComponentSet = [Component::Spliced, Component::Ambiguous]
            .into_iter()
            .collect();
        let descriptor = resolve(
            &r#"{"X": ["S"], "ambiguous": ["A"]}"#
                .parse::<StructureRequest>()
                .unwrap(),
            &availability,
        )
        .unwrap();
        crate::convert::assemble::assemble(&counts, &descriptor).unwrap()
    }

    fn map_of(pairs: &[(&str, &str)]) -> GeneIdNameMap {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t2g.tsv");
        let body: String = pairs
            .iter()
            .map(|(id, name)| format!("{}\t{}\n", id, name))
            .collect();
        fs::write(&path, body).unwrap();
        GeneIdNameMap::from_path(&path).unwrap()
    }

    #[test]
    fn full_map_keeps_every_column() {
        let matrix = matrix_with_genes(&["g1", "g2", "g3"]);
        let map = map_of(&[("g1", "A"), ("g2", "B"), ("g3", "C")]);
        let (remapped, unmapped) = remap(matrix, &map).unwrap();

        assert!(unmapped.is_empty());
        assert_eq!(remapped.var_names, vec!["A", "B", "C"]);
        assert_eq!(remapped.n_vars(), 3);
    }

    #[test]
    fn unmapped_columns_drop_from_every_layer_in_order() {
        let matrix = matrix_with_genes(&["g1", "g2", "g3", "g4", "g5"]);
        let map = map_of(&[("g2", "B"), ("g4", "D"), ("g5", "E")]);
        let (remapped, unmapped) = remap(matrix, &map).unwrap();

        assert_eq!(unmapped, vec!["g1", "g3"]);
        assert_eq!(remapped.var_names, vec!["B", "D", "E"]);
        assert_eq!(SparseOps::to_dense(&remapped.x), vec![2.0, 4.0, 5.0]);
        assert_eq!(
            SparseOps::to_dense(&remapped.layers[0].1),
            vec![2.0, 4.0, 5.0]
        );
    }

    #[test]
    fn duplicate_names_get_stable_suffixes() {
        let matrix = matrix_with_genes(&["g1", "g2", "g3"]);
        let map = map_of(&[("g1", "N"), ("g2", "N"), ("g3", "N")]);
        let (remapped, unmapped) = remap(matrix, &map).unwrap();

        assert!(unmapped.is_empty());
        assert_eq!(remapped.var_names, vec!["N", "N-1", "N-2"]);
    }

    #[test]
    fn suffixing_avoids_existing_names() {
        assert_eq!(
            make_unique(vec![
                "N".to_string(),
                "N-1".to_string(),
                "N".to_string(),
                "N".to_string(),
            ]),
            vec!["N", "N-1", "N-2", "N-3"]
        );
        assert_eq!(
            make_unique(vec!["N".to_string(), "N".to_string(), "N-1".to_string()]),
            vec!["N", "N-1", "N-1-1"]
        );
    }

    #[test]
    fn duplicate_map_keys_keep_the_last_name() {
        let map = map_of(&[("g1", "first"), ("g1", "second")]);
        assert_eq!(map.get("g1"), Some("second"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn malformed_record_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t2g.tsv");
        fs::write(&path, "g1\tA\ng2\n").unwrap();
        let err = GeneIdNameMap::from_path(&path);
        assert!(matches!(err, Err(FryconvError::Parse(_))));
    }

    #[test]
    fn missing_map_file_is_reported() {
        let err = GeneIdNameMap::from_path("/nonexistent/t2g.tsv");
        assert!(matches!(err, Err(FryconvError::MissingFile(_))));
    }
}
