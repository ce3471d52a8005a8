// File: modguard-common/src/lib.rs

pub mod error;
pub mod models;
pub mod traits;

pub use error::Error;
