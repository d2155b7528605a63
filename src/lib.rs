pub mod assembler;
pub mod citation;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod loader;
pub mod locator;
pub mod mass;
pub mod model;
pub mod output;
pub mod reader;
pub mod repository;
pub mod scanner;
pub mod sidecar;
pub mod store;
pub mod submission;
pub mod term_cache;
