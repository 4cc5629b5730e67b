//! Vintage file loading

pub mod loader;
pub mod timestamp;

pub use loader::{load_vintage, parse_vintage, LoadError, LoadOptions, LoadedVintage};
pub use timestamp::parse_period;
