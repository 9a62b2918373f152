pub mod aggregator;
pub mod apis;
pub mod config;
pub mod constants;
pub mod dates;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod pagination;
pub mod rate_limiter;
pub mod types;

pub use aggregator::Aggregator;
pub use config::{Config, HarvestSettings};
pub use error::{Result, ScraperError};
pub use orchestrator::{CrawlOrchestrator, Harvest, SourceReport};
pub use types::{AggregateResult, Event, Family, Source};
