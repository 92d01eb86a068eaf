pub mod api;
pub mod disk;
pub mod util;

#[cfg(feature = "typed")]
pub mod typed;
