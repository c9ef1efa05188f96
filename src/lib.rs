pub mod app;
pub mod certs;
pub mod cli;
pub mod config;
pub mod error;
pub mod identity;
pub mod keys;
pub mod signing;
#[cfg(test)]
pub mod test_utils;

pub use error::{Result, SignError};
pub use signing::{VerificationResult, sign_directory, verify_directory, verify_package};

/// Package version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
