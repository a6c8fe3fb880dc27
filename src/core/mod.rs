//! Core traits, types, and constants.
//!
//! This module has no feature-gated dependencies. It defines the cipher
//! seam used by the frame codec and the error types shared across layers.

mod constants;
mod error;
mod traits;

pub use constants::*;
pub use error::*;
pub use traits::*;
