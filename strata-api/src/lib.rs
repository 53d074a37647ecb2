//! Lowest level crate of `strata`. Contains the error type and the fixed-function pipeline state
//! description that render stage code is allowed to patch before a draw.

pub use error::*;
pub use types::*;

mod error;
mod types;
