//! # Semantic Graph Model
//!
//! Plain data shared by every layer: handles, type tags, link content and
//! element records. No I/O, no locks, no state.

pub mod handle;
pub mod types;
pub mod content;
pub mod element;

pub use handle::ElementHandle;
pub use types::Type;
pub use content::LinkContent;
pub use element::{EdgeEnds, Element, ElementBody};
