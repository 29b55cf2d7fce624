//! # Soun Common Library
//!
//! Shared code for the Soun services:
//! - Error types
//! - Bootstrap configuration loading
//! - Database pool, schema and migrations
//! - Row models for every table
//! - Retry wrapper for transient database errors
//! - Pagination helpers

pub mod config;
pub mod db;
pub mod error;
pub mod pagination;

pub use error::{Error, Result};
