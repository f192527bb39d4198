//! Draw rules: which features a style draws and how.

use serde_json::Value;

use crate::data::Feature;
use crate::error::StyleError;

/// Feature predicate evaluated against properties.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Filter {
    /// Matches every feature.
    #[default]
    All,
    /// Property `key` equals `value`.
    Equals { key: String, value: Value },
    /// Property `key` is present.
    Has(String),
    /// Negation.
    Not(Box<Filter>),
    /// Any of the filters matches.
    Any(Vec<Filter>),
    /// Every filter matches.
    AllOf(Vec<Filter>),
}

impl Filter {
    /// Shorthand for [`Filter::Equals`].
    pub fn equals(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Equals {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Evaluates the filter for a feature.
    pub fn matches(&self, feature: &Feature) -> bool {
        match self {
            Filter::All => true,
            Filter::Equals { key, value } => feature.property(key) == Some(value),
            Filter::Has(key) => feature.property(key).is_some(),
            Filter::Not(inner) => !inner.matches(feature),
            Filter::Any(filters) => filters.iter().any(|f| f.matches(feature)),
            Filter::AllOf(filters) => filters.iter().all(|f| f.matches(feature)),
        }
    }
}

/// Selects features of one layer and gives them draw parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawRule {
    /// Layer this rule applies to.
    pub layer: String,
    /// Feature filter.
    pub filter: Filter,
    /// RGBA fill color.
    pub color: [u8; 4],
    /// Line width or point size in tile units. Ignored by polygons.
    pub width: f32,
}

impl DrawRule {
    /// Creates a rule drawing every feature of `layer`.
    pub fn new(layer: impl Into<String>, color: [u8; 4]) -> Self {
        Self {
            layer: layer.into(),
            filter: Filter::All,
            color,
            width: 0.0,
        }
    }

    /// Restricts the rule to matching features.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Sets the width.
    pub fn with_width(mut self, width: f32) -> Self {
        self.width = width;
        self
    }

    /// Checks rule parameters before drawing.
    pub fn validate(&self) -> Result<(), StyleError> {
        if !self.width.is_finite() || self.width < 0.0 {
            return Err(StyleError::InvalidParameter {
                name: "width".to_string(),
                reason: format!("must be a finite non-negative number, got {}", self.width),
            });
        }
        Ok(())
    }

    /// Returns true if this rule draws the feature.
    pub fn applies_to(&self, layer: &str, feature: &Feature) -> bool {
        self.layer == layer && self.filter.matches(feature)
    }
}

/// Checks that every coordinate is finite.
pub(crate) fn check_finite(layer: &str, points: &[[f32; 2]]) -> Result<(), StyleError> {
    if points.iter().flatten().all(|c| c.is_finite()) {
        Ok(())
    } else {
        Err(StyleError::NonFiniteCoordinate {
            layer: layer.to_string(),
        })
    }
}
