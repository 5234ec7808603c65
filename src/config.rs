//! Runtime tunables for the viewer core.
//!
//! Every value has a compiled-in default and can be overridden through a
//! `FLICK_*` environment variable. Unparsable or zero values are ignored.

/// Maximum number of decoded images kept in memory.
pub const DEFAULT_CACHE_CAPACITY: usize = 10;
/// Neighbours on each side that are preloaded and protected from eviction.
pub const DEFAULT_RADIUS: usize = 2;
/// Concurrent background decodes.
pub const DEFAULT_PRELOAD_WORKERS: usize = 2;
/// Target width of the fast preview decode.
pub const DEFAULT_PREVIEW_WIDTH: u32 = 400;

const MAX_PRELOAD_WORKERS: usize = 8;
const MAX_RADIUS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerConfig {
    /// Entry count above which the cache evicts far-away images.
    pub cache_capacity: usize,
    /// Adjacency radius, used both for preloading and eviction protection.
    pub radius: usize,
    /// Size of the preload worker pool.
    pub max_concurrent: usize,
    /// Width bound for the low-resolution decode shown on navigation.
    pub preview_width: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            radius: DEFAULT_RADIUS,
            max_concurrent: DEFAULT_PRELOAD_WORKERS,
            preview_width: DEFAULT_PREVIEW_WIDTH,
        }
    }
}

impl ViewerConfig {
    /// Build a config from defaults overlaid with `FLICK_*` variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parse = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|v| *v > 0)
        };

        Self {
            cache_capacity: parse("FLICK_CACHE_CAPACITY").unwrap_or(defaults.cache_capacity),
            radius: parse("FLICK_RADIUS")
                .unwrap_or(defaults.radius)
                .min(MAX_RADIUS),
            max_concurrent: parse("FLICK_PRELOAD_WORKERS")
                .unwrap_or(defaults.max_concurrent)
                .clamp(1, MAX_PRELOAD_WORKERS),
            preview_width: parse("FLICK_PREVIEW_WIDTH")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.preview_width),
        }
    }
}
