//! Naming: episode inference, filename sanitizing and library layout
//!
//! Everything here except the filesystem lookups in [`layout`] is pure and synchronous.

mod episode;
pub mod layout;
mod sanitize;

pub use episode::parse_episode;
pub use layout::{
    MEDIA_EXTENSIONS, TargetLocation, build_target, find_existing_media, is_media_file,
    locate_downloaded_media,
};
pub use sanitize::{MAX_NAME_CHARS, sanitize};
