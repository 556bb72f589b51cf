//! Core engine: fetch → enrich → aggregate.

pub mod aggregator;
pub mod enricher;
pub mod executor;
pub mod flight;
pub mod injuries;
pub mod pipeline;

pub use enricher::{EnrichmentSettings, Enricher};
pub use executor::{FetchExecutor, FetchReport, FetchResult};
pub use injuries::InjuryRefresher;
pub use pipeline::LeaguePipeline;
