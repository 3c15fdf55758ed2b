//! Writing extracted images to disk.

mod format;
mod naming;
mod writer;

pub use format::OutputFormat;
pub use naming::{ImageNamer, NamingScheme, PageIndexNamer, RandomNamer};
pub use writer::{ImageSaver, SavedImage, SkippedItem};
