//! Kotoba - Localization Tree Translation
//!
//! Translates trees of JSON localization documents into other languages
//! while keeping embedded markup and `{{...}}` placeholders intact.

pub mod cli;
pub mod config;
pub mod corpus;
pub mod document;
pub mod error;
pub mod protect;
pub mod translate;
pub mod tree;
