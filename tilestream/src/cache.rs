//! Byte-bounded LRU cache of built tiles.
//!
//! The cache holds `Ready` tiles that recently left the active set so they can
//! be reinstated without rebuilding. It is owned by the manager and only
//! touched on the main thread, so it needs no internal locking.
//!
//! Every [`put`](TileCache::put) evicts least-recently-used entries until the
//! total footprint fits the capacity again. A tile bigger than the whole
//! capacity is rejected outright.

use lru::LruCache;
use tracing::{debug, trace};

use crate::tile::{SourceId, Tile, TileId};

/// Cache counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found a tile.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Tiles dropped to make room.
    pub evictions: u64,
    /// Tiles refused because they exceed the capacity.
    pub rejections: u64,
    /// Current number of entries.
    pub entries: usize,
    /// Current total footprint in bytes.
    pub size_bytes: usize,
}

impl CacheStats {
    /// Fraction of lookups that hit, in `[0, 1]`.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// LRU cache of tiles bounded by total memory footprint.
pub struct TileCache {
    entries: LruCache<TileId, Tile>,
    capacity_bytes: usize,
    usage_bytes: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
    rejections: u64,
}

impl TileCache {
    /// Creates a cache holding at most `capacity_bytes` of tiles.
    ///
    /// A capacity of zero disables caching.
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            capacity_bytes,
            usage_bytes: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
            rejections: 0,
        }
    }

    /// Looks up a tile and marks it most recently used.
    pub fn get(&mut self, id: &TileId) -> Option<&Tile> {
        match self.entries.get(id) {
            Some(tile) => {
                self.hits += 1;
                Some(tile)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Removes and returns a tile, e.g. to reinstate it in the active set.
    pub fn take(&mut self, id: &TileId) -> Option<Tile> {
        match self.entries.pop(id) {
            Some(tile) => {
                self.hits += 1;
                self.usage_bytes -= tile.memory_usage();
                Some(tile)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Inserts a tile as most recently used, then evicts down to capacity.
    ///
    /// Returns false if the tile was too large to be cached.
    pub fn put(&mut self, tile: Tile) -> bool {
        let size = tile.memory_usage();
        if size > self.capacity_bytes {
            self.rejections += 1;
            trace!(tile = %tile.id(), bytes = size, "Tile exceeds cache capacity");
            return false;
        }

        if let Some(old) = self.entries.put(tile.id(), tile) {
            self.usage_bytes -= old.memory_usage();
        }
        self.usage_bytes += size;
        self.evict_to_capacity();
        true
    }

    /// Removes every tile of a source.
    pub fn clear(&mut self, source: SourceId) {
        let ids: Vec<TileId> = self
            .entries
            .iter()
            .filter(|(id, _)| id.source == source)
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            if let Some(tile) = self.entries.pop(id) {
                self.usage_bytes -= tile.memory_usage();
            }
        }
        debug!(source = %source, removed = ids.len(), "Cleared cached tiles");
    }

    /// Removes every tile.
    pub fn clear_all(&mut self) {
        self.entries.clear();
        self.usage_bytes = 0;
    }

    /// Returns true if the tile is cached, without touching recency.
    pub fn contains(&self, id: &TileId) -> bool {
        self.entries.contains(id)
    }

    /// Total footprint of cached tiles in bytes.
    pub fn memory_usage(&self) -> usize {
        self.usage_bytes
    }

    /// Byte budget.
    pub fn capacity(&self) -> usize {
        self.capacity_bytes
    }

    /// Changes the capacity, evicting if it shrank.
    pub fn set_capacity(&mut self, capacity_bytes: usize) {
        self.capacity_bytes = capacity_bytes;
        self.evict_to_capacity();
    }

    /// Number of cached tiles.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            rejections: self.rejections,
            entries: self.entries.len(),
            size_bytes: self.usage_bytes,
        }
    }

    fn evict_to_capacity(&mut self) {
        while self.usage_bytes > self.capacity_bytes {
            let Some((id, tile)) = self.entries.pop_lru() else {
                break;
            };
            self.usage_bytes -= tile.memory_usage();
            self.evictions += 1;
            trace!(tile = %id, bytes = tile.memory_usage(), "Evicted cached tile");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::Mesh;
    use proptest::prelude::*;

    fn tile(x: u32, source: u32, quads: usize) -> Tile {
        let mut tile = Tile::new(TileId::new(x, 0, 10, SourceId(source)), 0);
        let mut mesh = Mesh::new();
        for _ in 0..quads {
            mesh.push_quad([[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]], [0; 4]);
        }
        tile.add_mesh("fill", mesh);
        tile.mark_ready();
        tile
    }

    #[test]
    fn test_put_and_take() {
        let mut cache = TileCache::new(1 << 20);
        let t = tile(1, 0, 4);
        let id = t.id();
        let size = t.memory_usage();

        assert!(cache.put(t));
        assert_eq!(cache.memory_usage(), size);
        assert!(cache.contains(&id));

        let back = cache.take(&id).unwrap();
        assert_eq!(back.id(), id);
        assert_eq!(cache.memory_usage(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let size = tile(0, 0, 4).memory_usage();
        let mut cache = TileCache::new(size * 2);

        cache.put(tile(1, 0, 4));
        cache.put(tile(2, 0, 4));
        // Touch 1 so 2 becomes the eviction candidate
        assert!(cache.get(&TileId::new(1, 0, 10, SourceId(0))).is_some());
        cache.put(tile(3, 0, 4));

        assert!(cache.contains(&TileId::new(1, 0, 10, SourceId(0))));
        assert!(!cache.contains(&TileId::new(2, 0, 10, SourceId(0))));
        assert!(cache.contains(&TileId::new(3, 0, 10, SourceId(0))));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_oversized_tile_rejected() {
        let mut cache = TileCache::new(64);
        assert!(!cache.put(tile(1, 0, 100)));
        assert!(cache.is_empty());
        assert_eq!(cache.stats().rejections, 1);
    }

    #[test]
    fn test_zero_capacity() {
        let mut cache = TileCache::new(0);
        assert!(!cache.put(tile(1, 0, 1)));
        assert_eq!(cache.memory_usage(), 0);
    }

    #[test]
    fn test_replace_same_id() {
        let mut cache = TileCache::new(1 << 20);
        cache.put(tile(1, 0, 1));
        let bigger = tile(1, 0, 8);
        let size = bigger.memory_usage();
        cache.put(bigger);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.memory_usage(), size);
    }

    #[test]
    fn test_clear_source() {
        let mut cache = TileCache::new(1 << 20);
        cache.put(tile(1, 0, 1));
        cache.put(tile(2, 1, 1));
        let keep = cache.memory_usage() - tile(1, 0, 1).memory_usage();

        cache.clear(SourceId(0));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&TileId::new(2, 0, 10, SourceId(1))));
        assert_eq!(cache.memory_usage(), keep);
    }

    #[test]
    fn test_hit_miss_counters() {
        let mut cache = TileCache::new(1 << 20);
        cache.put(tile(1, 0, 1));
        cache.get(&TileId::new(1, 0, 10, SourceId(0)));
        cache.get(&TileId::new(9, 0, 10, SourceId(0)));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shrink_capacity() {
        let mut cache = TileCache::new(1 << 20);
        for x in 0..8 {
            cache.put(tile(x, 0, 2));
        }
        cache.set_capacity(tile(0, 0, 2).memory_usage() * 3);
        assert_eq!(cache.len(), 3);
    }

    proptest! {
        #[test]
        fn prop_usage_within_capacity(
            capacity in 0usize..20_000,
            ops in prop::collection::vec((0u32..16, 0usize..40), 1..60),
        ) {
            let mut cache = TileCache::new(capacity);
            for (x, quads) in ops {
                cache.put(tile(x, 0, quads));
                prop_assert!(cache.memory_usage() <= capacity);

                let sum: usize = (0..16)
                    .filter_map(|x| cache.entries.peek(&TileId::new(x, 0, 10, SourceId(0))))
                    .map(Tile::memory_usage)
                    .sum();
                prop_assert_eq!(sum, cache.memory_usage());
            }
        }
    }
}
