//! Fragment render cache: serve, generate and store cacheable component
//! output across a render tree.

pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod render;
