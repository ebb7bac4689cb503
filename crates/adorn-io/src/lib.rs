//! adorn-io — Filesystem and image plumbing around the placement planner.
//!
//! Loads the accessory catalog, pairs avatars with their face data, and
//! composites planned sticker layers onto the avatar.

pub mod canvas;
pub mod catalog;
pub mod discover;
pub mod error;

pub use canvas::{composite, draw_indicators, load_image, save_image, StickerCache};
pub use catalog::{load_catalog, DEFAULT_CATALOG};
pub use discover::{discover_images, pair_with_face_data, read_face, InputUnit};
pub use error::IoError;
