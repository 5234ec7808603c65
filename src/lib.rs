//! Adjacent-image prefetch cache for a single-image viewer.

pub mod cache;
pub mod config;
pub mod decoder;
pub mod error;
pub mod generation;
pub mod keybindings;
pub mod media;
pub mod preload;
pub mod refresh;
pub mod viewer;

#[cfg(test)]
mod testing;

pub use cache::CacheStore;
pub use config::ViewerConfig;
pub use decoder::{Decode, DecodeError, DecodeMode, DecodedImage, FileDecoder, SharedImage};
pub use error::{Result, ViewerError};
pub use generation::{CancellationCoordinator, RoundToken};
pub use media::{MediaKind, MediaList};
pub use preload::{PreloadOutcome, PreloadRound, PreloadScheduler, TaskState};
pub use viewer::{DisplaySurface, Viewer};
