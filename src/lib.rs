//! Photo ingestion and display pipeline for a palette-limited e-ink frame.
//!
//! Raw images are normalized to 800x480 library frames, kept in a bounded
//! directory with a persisted "current photo" pointer, and optionally rendered
//! as a Floyd–Steinberg dithered preview in the panel's native colours.

pub mod config;
pub mod display;
pub mod dither;
pub mod error;
pub mod events;
pub mod frame;
pub mod ingest;
pub mod library;
pub mod normalize;
pub mod palette;
pub mod processing {
    pub mod decode;
    pub mod layout;
    pub mod resize;
}
pub mod tasks {
    pub mod frame;
    pub mod inbox;
}

pub use error::{Error, Result};
pub use ingest::{Ingested, IngestionPipeline};
pub use library::{LibraryStore, Photo, RetentionReport};
pub use normalize::{Normalized, Normalizer};
pub use palette::Palette;
