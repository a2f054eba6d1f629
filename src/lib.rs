pub mod error;
pub mod models;
pub mod session;
pub mod config;
pub mod loader;
pub mod labels;
pub mod indexer;
pub mod preprocessing;
pub mod split;
pub mod classifier;
pub mod evaluation;
pub mod store;
pub mod pipeline;
pub mod junk_drawer;

pub use error::{Error, Result};
