//! Output-structure requests and their resolution
//!
//! An output structure describes how the raw unspliced/spliced/ambiguous
//! count components are combined into named layers of the output matrix. A
//! request is either a built-in preset or a user-supplied mapping literal;
//! both resolve to a validated [`StructureDescriptor`] before any matrix is
//! touched.

use crate::core::error::{FryconvError, Result};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Raw count component produced by the upstream quantifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Component {
    Unspliced,
    Spliced,
    Ambiguous,
}

/// Set of components a quantification directory actually produced.
pub type ComponentSet = BTreeSet<Component>;

impl Component {
    /// Canonical one-letter tag used in structure requests.
    pub fn tag(self) -> char {
        match self {
            Component::Unspliced => 'U',
            Component::Spliced => 'S',
            Component::Ambiguous => 'A',
        }
    }

    fn layer_name(self) -> &'static str {
        match self {
            Component::Unspliced => "unspliced",
            Component::Spliced => "spliced",
            Component::Ambiguous => "ambiguous",
        }
    }
}

impl FromStr for Component {
    type Err = FryconvError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "U" => Ok(Component::Unspliced),
            "S" => Ok(Component::Spliced),
            "A" => Ok(Component::Ambiguous),
            other => Err(FryconvError::InvalidStructure(format!(
                "unknown component tag {:?} (expected U, S, or A)",
                other
            ))),
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Built-in output structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// One undifferentiated count layer over all components.
    Raw,
    /// Spliced + ambiguous counted as mature mRNA.
    ScRna,
    /// All components counted as nuclear content.
    SnRna,
    /// Spliced primary with an unspliced layer for RNA velocity.
    Velocity,
    /// Spliced + ambiguous primary, components kept as separate layers.
    SplicedAmbiguous,
    /// One layer per component, unspliced first.
    Usa,
    /// One layer per available component, spliced first.
    All,
}

impl Preset {
    pub fn name(self) -> &'static str {
        match self {
            Preset::Raw => "raw",
            Preset::ScRna => "scRNA",
            Preset::SnRna => "snRNA",
            Preset::Velocity => "velocity",
            Preset::SplicedAmbiguous => "S+A",
            Preset::Usa => "U+S+A",
            Preset::All => "all",
        }
    }

    /// Exact, case-sensitive preset lookup.
    fn from_name(s: &str) -> Option<Preset> {
        match s {
            "raw" => Some(Preset::Raw),
            "scRNA" => Some(Preset::ScRna),
            "snRNA" => Some(Preset::SnRna),
            "velocity" => Some(Preset::Velocity),
            "S+A" => Some(Preset::SplicedAmbiguous),
            "U+S+A" => Some(Preset::Usa),
            "all" => Some(Preset::All),
            _ => None,
        }
    }
}

/// A structure request as it arrives from the command line.
#[derive(Debug, Clone)]
pub enum StructureRequest {
    Preset(Preset),
    Custom(Vec<(String, Vec<Component>)>),
}

impl FromStr for StructureRequest {
    type Err = FryconvError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(preset) = Preset::from_name(s) {
            return Ok(StructureRequest::Preset(preset));
        }
        parse_custom_literal(s).map(StructureRequest::Custom)
    }
}

/// Layer mapping literal, kept as an ordered list so duplicate keys are
/// detected instead of silently collapsing.
struct LayerLiteral(Vec<(String, Vec<String>)>);

impl<'de> Deserialize<'de> for LayerLiteral {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct LayerVisitor;

        impl<'de> Visitor<'de> for LayerVisitor {
            type Value = LayerLiteral;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map from layer name to a list of component tags")
            }

            fn visit_map<M>(self, mut access: M) -> std::result::Result<Self::Value, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some((key, value)) = access.next_entry::<String, Vec<String>>()? {
                    entries.push((key, value));
                }
                Ok(LayerLiteral(entries))
            }
        }

        deserializer.deserialize_map(LayerVisitor)
    }
}

fn parse_custom_literal(raw: &str) -> Result<Vec<(String, Vec<Component>)>> {
    let literal: LayerLiteral = serde_json::from_str(raw).map_err(|e| {
        FryconvError::InvalidStructure(format!(
            "could not parse {:?} as a preset name or a layer mapping: {}",
            raw, e
        ))
    })?;

    let mut seen = BTreeSet::new();
    let mut layers = Vec::with_capacity(literal.0.len());
    for (name, tags) in literal.0 {
        if name.is_empty() {
            return Err(FryconvError::InvalidStructure(
                "layer names must not be empty".to_string(),
            ));
        }
        if !seen.insert(name.clone()) {
            return Err(FryconvError::InvalidStructure(format!(
                "layer {:?} appears more than once",
                name
            )));
        }
        let mut components = Vec::with_capacity(tags.len());
        for tag in &tags {
            let component = tag.parse::<Component>()?;
            if !components.contains(&component) {
                components.push(component);
            }
        }
        layers.push((name, components));
    }
    Ok(layers)
}

/// Normalized output structure: ordered, uniquely named layers over
/// validated component sets. The first layer is the primary one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureDescriptor {
    layers: Vec<(String, Vec<Component>)>,
}

impl StructureDescriptor {
    pub fn layers(&self) -> &[(String, Vec<Component>)] {
        &self.layers
    }
}

/// Resolve a structure request against the components the quantification
/// actually produced.
pub fn resolve(
    request: &StructureRequest,
    availability: &ComponentSet,
) -> Result<StructureDescriptor> {
    let layers = match request {
        StructureRequest::Preset(preset) => expand_preset(*preset, availability)?,
        StructureRequest::Custom(requested) => {
            let mut layers = Vec::with_capacity(requested.len());
            for (name, components) in requested {
                // a layer without components is degenerate and dropped
                if components.is_empty() {
                    continue;
                }
                layers.push((name.clone(), components.clone()));
            }
            if layers.is_empty() {
                return Err(FryconvError::InvalidStructure(
                    "the layer mapping does not define any non-empty layer".to_string(),
                ));
            }
            layers
        }
    };

    for (_, components) in &layers {
        for component in components {
            if !availability.contains(component) {
                return Err(unavailable(*component, availability));
            }
        }
    }

    Ok(StructureDescriptor { layers })
}

fn unavailable(component: Component, availability: &ComponentSet) -> FryconvError {
    FryconvError::UnavailableComponent {
        component: component.tag(),
        available: availability
            .iter()
            .map(|c| c.tag().to_string())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn expand_preset(
    preset: Preset,
    availability: &ComponentSet,
) -> Result<Vec<(String, Vec<Component>)>> {
    use Component::*;

    let layer = |name: &str, components: &[Component]| (name.to_string(), components.to_vec());

    let layers = match preset {
        Preset::Raw | Preset::SnRna => vec![layer("X", &[Unspliced, Spliced, Ambiguous])],
        Preset::ScRna => vec![layer("X", &[Spliced, Ambiguous])],
        Preset::Velocity => {
            let mut layers = vec![layer("X", &[Spliced]), layer("unspliced", &[Unspliced])];
            if availability.contains(&Ambiguous) {
                layers.push(layer("ambiguous", &[Ambiguous]));
            }
            layers
        }
        Preset::SplicedAmbiguous => vec![
            layer("X", &[Spliced, Ambiguous]),
            layer("spliced", &[Spliced]),
            layer("ambiguous", &[Ambiguous]),
        ],
        Preset::Usa => vec![
            layer("unspliced", &[Unspliced]),
            layer("spliced", &[Spliced]),
            layer("ambiguous", &[Ambiguous]),
        ],
        Preset::All => {
            let mut layers = Vec::new();
            for component in [Spliced, Unspliced, Ambiguous] {
                if availability.contains(&component) {
                    layers.push(layer(component.layer_name(), &[component]));
                }
            }
            if layers.is_empty() {
                return Err(FryconvError::InvalidStructure(
                    "no quantified component is available for the `all` structure".to_string(),
                ));
            }
            layers
        }
    };

    Ok(layers)
}
