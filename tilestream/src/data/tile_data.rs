//! Parsed tile payloads.
//!
//! Payloads are JSON documents of named layers holding features. Coordinates
//! are tile-local and normalized: `(0, 0)` is the top-left corner of the tile
//! and `(1, 1)` the bottom-right.
//!
//! ```json
//! {
//!   "layers": [
//!     {
//!       "name": "water",
//!       "features": [
//!         {
//!           "geometry": { "type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1]]] },
//!           "properties": { "kind": "lake" }
//!         }
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TileError;
use crate::tile::TileId;

/// Feature geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    /// A single point.
    Point([f32; 2]),
    /// An open polyline.
    LineString(Vec<[f32; 2]>),
    /// Rings; the first is the outer boundary, the rest are holes.
    Polygon(Vec<Vec<[f32; 2]>>),
}

impl Geometry {
    /// Short name of the geometry type.
    pub fn kind(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::LineString(_) => "LineString",
            Geometry::Polygon(_) => "Polygon",
        }
    }
}

/// A feature with its properties.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Feature geometry.
    pub geometry: Geometry,
    /// Arbitrary properties used by draw-rule filters.
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl Feature {
    /// Creates a feature without properties.
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            properties: BTreeMap::new(),
        }
    }

    /// Adds a property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Looks up a property.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// A named collection of features.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Layer name matched by draw rules.
    pub name: String,
    /// Features in this layer.
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl Layer {
    /// Creates an empty layer.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            features: Vec::new(),
        }
    }

    /// Appends a feature.
    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.features.push(feature);
        self
    }
}

/// Structured payload of one tile.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TileData {
    /// Layers in drawing order.
    #[serde(default)]
    pub layers: Vec<Layer>,
}

impl TileData {
    /// Creates an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a layer.
    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.layers.push(layer);
        self
    }

    /// Looks up a layer by name.
    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    /// Total number of features across layers.
    pub fn feature_count(&self) -> usize {
        self.layers.iter().map(|l| l.features.len()).sum()
    }

    /// Decodes a JSON payload.
    pub fn from_json(tile: TileId, bytes: &[u8]) -> Result<Self, TileError> {
        serde_json::from_slice(bytes).map_err(|e| TileError::parse(tile, e.to_string()))
    }

    /// Encodes this payload as JSON.
    pub fn to_json(&self) -> Vec<u8> {
        // Serializing plain data structs with string keys cannot fail
        serde_json::to_vec(self).unwrap_or_default()
    }
}
