//! Types shared by the social login crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
