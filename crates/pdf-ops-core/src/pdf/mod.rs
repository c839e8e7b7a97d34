mod arcfour;
pub mod codec;
mod document;
pub mod overlay;
mod page_index;
mod rotation;
pub mod security;
#[cfg(test)]
pub(crate) mod testing;

pub use codec::{decode, encode};
pub use document::{Document, MediaBox, Page, SecurityState};
pub use overlay::{Overlay, OverlayResources};
pub use page_index::PageIndex;
pub use rotation::Rotation;
pub use security::{FileKey, StandardSecurity};
