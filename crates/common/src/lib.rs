//! Shared types for the Fortnox SDK workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
