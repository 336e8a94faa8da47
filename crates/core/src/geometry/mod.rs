mod variants;

use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{ColorContext, Result, SceneGraph, VisualiserError};

/// Named geometry scenes the catalog can construct.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum GeometryVariant {
    #[default]
    FlowerOfLife,
    Merkaba,
    TorusField,
    VesicaPiscis,
    SriYantra,
    FractalNest,
}

impl GeometryVariant {
    pub const ALL: [GeometryVariant; 6] = [
        GeometryVariant::FlowerOfLife,
        GeometryVariant::Merkaba,
        GeometryVariant::TorusField,
        GeometryVariant::VesicaPiscis,
        GeometryVariant::SriYantra,
        GeometryVariant::FractalNest,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GeometryVariant::FlowerOfLife => "flower-of-life",
            GeometryVariant::Merkaba => "merkaba",
            GeometryVariant::TorusField => "torus-field",
            GeometryVariant::VesicaPiscis => "vesica-piscis",
            GeometryVariant::SriYantra => "sri-yantra",
            GeometryVariant::FractalNest => "fractal-nest",
        }
    }

    /// The variant after this one, wrapping around.
    pub fn next(self) -> Self {
        let index = Self::ALL.iter().position(|v| *v == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for GeometryVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GeometryVariant {
    type Err = VisualiserError;

    fn from_str(value: &str) -> Result<Self> {
        let wanted = value.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        Self::ALL
            .into_iter()
            .find(|variant| variant.name() == wanted)
            .ok_or_else(|| VisualiserError::UnknownVariant(value.to_string()))
    }
}

/// Pure constructor for one variant.
pub type Constructor = fn(&ColorContext) -> SceneGraph;

/// Registry of variant constructors. Constructors share no state, so every
/// graph they return can be attached and disposed independently.
#[derive(Debug, Clone)]
pub struct GeometryCatalog {
    constructors: HashMap<GeometryVariant, Constructor>,
}

impl GeometryCatalog {
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Catalog with every built-in variant registered.
    pub fn standard() -> Self {
        let mut catalog = Self::empty();
        catalog.register(GeometryVariant::FlowerOfLife, variants::flower_of_life);
        catalog.register(GeometryVariant::Merkaba, variants::merkaba);
        catalog.register(GeometryVariant::TorusField, variants::torus_field);
        catalog.register(GeometryVariant::VesicaPiscis, variants::vesica_piscis);
        catalog.register(GeometryVariant::SriYantra, variants::sri_yantra);
        catalog.register(GeometryVariant::FractalNest, variants::fractal_nest);
        catalog
    }

    /// Registers or replaces the constructor for `variant`.
    pub fn register(&mut self, variant: GeometryVariant, constructor: Constructor) {
        self.constructors.insert(variant, constructor);
    }

    pub fn contains(&self, variant: GeometryVariant) -> bool {
        self.constructors.contains_key(&variant)
    }

    pub fn variants(&self) -> Vec<GeometryVariant> {
        let mut variants: Vec<_> = self.constructors.keys().copied().collect();
        variants.sort();
        variants
    }

    pub fn build(&self, variant: GeometryVariant, colors: &ColorContext) -> Result<SceneGraph> {
        let constructor = self
            .constructors
            .get(&variant)
            .ok_or_else(|| VisualiserError::UnknownVariant(variant.name().to_string()))?;
        Ok(constructor(colors))
    }
}

impl Default for GeometryCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
