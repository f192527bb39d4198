//! Styles turn parsed feature data into geometry.
//!
//! A [`Style`] owns a list of [`DrawRule`]s. Building a tile runs every style
//! of the [`Scene`] over the tile's [`TileData`]; each style fills its own
//! [`Mesh`]. Styles are shared read-only between worker threads.

mod line;
mod point;
mod polygon;
mod rule;
mod scene;

pub use line::LineStyle;
pub use point::PointStyle;
pub use polygon::PolygonStyle;
pub use rule::{DrawRule, Filter};
pub use scene::Scene;

use crate::data::{Feature, TileData};
use crate::error::StyleError;
use crate::tile::Mesh;

/// A named set of draw rules producing one mesh per tile.
pub trait Style: Send + Sync + 'static {
    /// Style name; keys the mesh in the built tile.
    fn name(&self) -> &str;

    /// Draw rules in evaluation order.
    fn rules(&self) -> &[DrawRule];

    /// Appends geometry for one feature matched by `rule`.
    ///
    /// Features whose geometry type the style does not draw are skipped.
    fn draw_feature(
        &self,
        layer: &str,
        feature: &Feature,
        rule: &DrawRule,
        mesh: &mut Mesh,
    ) -> Result<(), StyleError>;

    /// Evaluates every rule against the tile data.
    ///
    /// A feature matched by several rules is drawn once per rule.
    fn draw(&self, data: &TileData, mesh: &mut Mesh) -> Result<(), StyleError> {
        for rule in self.rules() {
            rule.validate()?;
            let Some(layer) = data.layer(&rule.layer) else {
                continue;
            };
            for feature in layer.features.iter().filter(|f| rule.filter.matches(f)) {
                self.draw_feature(&layer.name, feature, rule, mesh)?;
            }
        }
        Ok(())
    }
}
