use crate::city::City;
use clap::Parser;

/// Publish a city's street catalog to the work queue and persist it
#[derive(Parser, Debug)]
#[command(name = "street-ingestor", version)]
pub struct Cli {
    /// City to ingest, e.g. telaviv or jerusalem
    pub city: City,
}
