//! Request extractors.

mod principal;
pub use principal::Principal;
