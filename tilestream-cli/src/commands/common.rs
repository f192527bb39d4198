//! Scene and config setup shared across commands.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tilestream::style::{DrawRule, Filter, LineStyle, PointStyle, PolygonStyle};
use tilestream::{PipelineConfig, Scene, SourceId, SyntheticSource};

use crate::error::CliError;

/// Id of the synthetic source in the demo scene.
pub const DEMO_SOURCE: SourceId = SourceId(0);

/// Loads the config file if one was given, otherwise the defaults.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig, CliError> {
    match path {
        Some(path) => Ok(PipelineConfig::load(path)?),
        None => Ok(PipelineConfig::default()),
    }
}

/// The synthetic source used by the demo scene.
pub fn demo_source(grid_size: u32, latency: Duration) -> SyntheticSource {
    SyntheticSource::new(DEMO_SOURCE, "synthetic")
        .with_grid_size(grid_size)
        .with_latency(latency)
}

/// A scene drawing every layer [`SyntheticSource`] generates.
pub fn demo_scene(source: SyntheticSource) -> Arc<Scene> {
    let landuse = PolygonStyle::new("landuse")
        .with_rule(
            DrawRule::new("landuse", [170, 210, 160, 255])
                .with_filter(Filter::equals("kind", "park")),
        )
        .with_rule(
            DrawRule::new("landuse", [230, 225, 215, 255])
                .with_filter(Filter::equals("kind", "residential")),
        );
    let buildings =
        PolygonStyle::new("buildings").with_rule(DrawRule::new("buildings", [200, 190, 180, 255]));
    let roads = LineStyle::new("roads")
        .with_rule(
            DrawRule::new("roads", [250, 200, 80, 255])
                .with_filter(Filter::equals("kind", "major"))
                .with_width(0.012),
        )
        .with_rule(
            DrawRule::new("roads", [255, 255, 255, 255])
                .with_filter(Filter::equals("kind", "minor"))
                .with_width(0.006),
        );
    let pois = PointStyle::new("pois")
        .with_rule(DrawRule::new("pois", [200, 60, 60, 255]).with_width(0.02));

    Arc::new(
        Scene::new()
            .with_style(landuse)
            .with_style(buildings)
            .with_style(roads)
            .with_style(pois)
            .with_source(source),
    )
}
