pub mod catalog_client;
pub mod city;
pub mod cli;
pub mod codec;
pub mod completion;
pub mod config;
pub mod consumer;
pub mod database;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod producer;
pub mod sink;
pub mod source;

pub use config::Config;
pub use errors::{IngestError, Result};
pub use pipeline::{run_pipeline, PipelineReport};
