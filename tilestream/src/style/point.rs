//! Point markers.

use crate::data::{Feature, Geometry};
use crate::error::StyleError;
use crate::tile::Mesh;

use super::rule::{check_finite, DrawRule};
use super::Style;

/// Draws a square marker of side `width` centered on each point.
pub struct PointStyle {
    name: String,
    rules: Vec<DrawRule>,
}

impl PointStyle {
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

impl Style for PointStyle {
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
        let Geometry::Point(p) = &feature.geometry else {
            return Ok(());
        };
        check_finite(layer, std::slice::from_ref(p))?;

        let h = rule.width * 0.5;
        mesh.push_quad(
            [
                [p[0] - h, p[1] - h],
                [p[0] + h, p[1] - h],
                [p[0] + h, p[1] + h],
                [p[0] - h, p[1] + h],
            ],
            rule.color,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Layer, TileData};
    use crate::style::Filter;

    #[test]
    fn test_marker_per_matching_point() {
        let style = PointStyle::new("pois").with_rule(
            DrawRule::new("pois", [255, 0, 0, 255])
                .with_width(0.02)
                .with_filter(Filter::Has("rank".to_string())),
        );
        let layer = Layer::new("pois")
            .with_feature(Feature::new(Geometry::Point([0.5, 0.5])).with_property("rank", 1))
            .with_feature(Feature::new(Geometry::Point([0.2, 0.2])));
        let data = TileData::new().with_layer(layer);

        let mut mesh = Mesh::new();
        style.draw(&data, &mut mesh).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
    }
}
