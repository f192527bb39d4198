//! Scene snapshots.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::data::TileSource;

use super::Style;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Styles and data sources loaded together.
///
/// A scene is immutable once shared. Reloading creates a new scene with a
/// fresh generation; workers capture the current `Arc<Scene>` when they
/// dequeue a task, so tasks in flight finish against the scene they started
/// with.
pub struct Scene {
    generation: u64,
    styles: Vec<Arc<dyn Style>>,
    sources: Vec<Arc<dyn TileSource>>,
}

impl Scene {
    /// Creates an empty scene with a new generation number.
    pub fn new() -> Self {
        Self {
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            styles: Vec::new(),
            sources: Vec::new(),
        }
    }

    /// Adds a style.
    pub fn with_style(mut self, style: impl Style) -> Self {
        self.styles.push(Arc::new(style));
        self
    }

    /// Adds a data source.
    pub fn with_source(mut self, source: impl TileSource) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    /// Adds an already shared data source.
    pub fn with_shared_source(mut self, source: Arc<dyn TileSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Unique, increasing id of this scene.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Styles in draw order.
    pub fn styles(&self) -> &[Arc<dyn Style>] {
        &self.styles
    }

    pub fn sources(&self) -> &[Arc<dyn TileSource>] {
        &self.sources
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("generation", &self.generation)
            .field(
                "styles",
                &self.styles.iter().map(|s| s.name().to_string()).collect::<Vec<_>>(),
            )
            .field(
                "sources",
                &self.sources.iter().map(|s| s.name().to_string()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemorySource;
    use crate::style::PolygonStyle;
    use crate::tile::SourceId;

    #[test]
    fn test_generations_increase() {
        let a = Scene::new();
        let b = Scene::new();
        assert!(b.generation() > a.generation());
    }

    #[test]
    fn test_builder() {
        let scene = Scene::new()
            .with_style(PolygonStyle::new("fill"))
            .with_source(MemorySource::new(SourceId(0), "client"));
        assert_eq!(scene.styles().len(), 1);
        assert_eq!(scene.sources()[0].id(), SourceId(0));
    }
}
