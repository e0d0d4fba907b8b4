//! Configuration: the matrix registry and environment inputs

pub mod env;
pub mod matrix_toml;
pub mod validation;

pub use env::BuildEnv;
pub use matrix_toml::{AndroidSettings, MatrixConfig};
