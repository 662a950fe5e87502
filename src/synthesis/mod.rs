//! Builds concrete split/merge networks from a reduced ratio.
pub mod merge;
pub mod smart;
pub mod split;

pub use merge::{even_merge, fold};
pub use smart::smart_split;
pub use split::even_split;
