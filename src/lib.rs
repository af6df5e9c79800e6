#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod clock;

mod statistics;
pub use statistics::*;

mod error;
pub use error::*;

mod common;
pub use common::{SanitizeThreshold, WindowSizeSeconds};

#[cfg(test)]
mod tests;
