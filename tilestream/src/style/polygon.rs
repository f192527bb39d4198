//! Filled polygons.

use crate::data::{Feature, Geometry};
use crate::error::StyleError;
use crate::tile::Mesh;

use super::rule::{check_finite, DrawRule};
use super::Style;

/// Fills polygon outer rings with a triangle fan.
///
/// Rings are assumed convex or star-shaped around their first vertex; holes
/// are ignored.
pub struct PolygonStyle {
    name: String,
    rules: Vec<DrawRule>,
}

impl PolygonStyle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: DrawRule) -> Self {
        self.rules.push(rule);
        self
    }
}

impl Style for PolygonStyle {
    fn name(&self) -> &str {
        &self.name
    }

    fn rules(&self) -> &[DrawRule] {
        &self.rules
    }

    fn draw_feature(
        &self,
        layer: &str,
        feature: &Feature,
        rule: &DrawRule,
        mesh: &mut Mesh,
    ) -> Result<(), StyleError> {
        let Geometry::Polygon(rings) = &feature.geometry else {
            return Ok(());
        };
        let Some(outer) = rings.first() else {
            return Ok(());
        };
        check_finite(layer, outer)?;

        // A closed ring repeats its first point at the end
        let ring = match (outer.first(), outer.last()) {
            (Some(first), Some(last)) if outer.len() > 1 && first == last => {
                &outer[..outer.len() - 1]
            }
            _ => &outer[..],
        };
        if ring.len() < 3 {
            return Err(StyleError::DegenerateRing {
                layer: layer.to_string(),
                points: ring.len(),
            });
        }

        let base = mesh.push_vertex(ring[0], rule.color);
        for point in &ring[1..] {
            mesh.push_vertex(*point, rule.color);
        }
        for i in 1..ring.len() as u32 - 1 {
            mesh.push_triangle(base, base + i, base + i + 1);
        }
        Ok(())
    }
}
