//! Configuration module for LogChefQL.
//!
//! This module contains configuration structures for the query cache.

pub mod cache;

pub use cache::{CacheConfig, ConfigError};
