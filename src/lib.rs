//! tablemark - PDF table extraction for annotation workflows.
//!
//! Core library: file storage and versioning, layout extraction, table
//! normalization and the background parse job.

// Model types use `from_str` methods that return Option<Self>,
// not Result<Self, Error> as std::str::FromStr requires.
#![allow(clippy::should_implement_trait)]

pub mod app;
pub mod config;
pub mod extraction;
pub mod files;
pub mod migrations;
pub mod models;
pub mod parse;
pub mod repository;
pub mod schema;
pub mod storage;
