pub mod config;
pub mod controller;
pub mod error;
pub mod http;
pub mod metrics;

pub use error::{Error, Result};
