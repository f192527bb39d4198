//! Stroked polylines.

use crate::data::{Feature, Geometry};
use crate::error::StyleError;
use crate::tile::Mesh;

use super::rule::{check_finite, DrawRule};
use super::Style;

/// Strokes line strings with one quad per segment.
///
/// Joins and caps are not drawn.
pub struct LineStyle {
    name: String,
    rules: Vec<DrawRule>,
}

impl LineStyle {
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

impl Style for LineStyle {
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
        let Geometry::LineString(points) = &feature.geometry else {
            return Ok(());
        };
        check_finite(layer, points)?;
        if points.len() < 2 {
            return Err(StyleError::DegenerateLine {
                layer: layer.to_string(),
                points: points.len(),
            });
        }

        let half = rule.width * 0.5;
        for segment in points.windows(2) {
            let [a, b] = [segment[0], segment[1]];
            let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
            let len = (dx * dx + dy * dy).sqrt();
            if len == 0.0 {
                continue;
            }
            // Unit normal scaled to half the stroke width
            let (nx, ny) = (-dy / len * half, dx / len * half);
            mesh.push_quad(
                [
                    [a[0] + nx, a[1] + ny],
                    [b[0] + nx, b[1] + ny],
                    [b[0] - nx, b[1] - ny],
                    [a[0] - nx, a[1] - ny],
                ],
                rule.color,
            );
        }
        Ok(())
    }
}
