//! # perfdata-influxdb
//!
//! Fetches performance data (value, warning and critical thresholds per
//! metric) of monitoring checks from InfluxDB 1.x and turns it into
//! per-metric datasets ready to be graphed.
//!
//! ## How a request works
//!
//! 1. A `COUNT(value)` query finds out how many points each metric has in
//!    the requested range.
//! 2. If that exceeds the configured maximum, the value query is bucketed
//!    with `GROUP BY time(<window>s)` and `LAST(...)` aggregates.
//! 3. The CSV body of the value query is decoded record by record while it
//!    streams in, and grouped into [`Dataset`]s in first-seen order.
//!
//! ## Quick Start
//!
//! ```ignore
//! use perfdata_influxdb::{Client, Config, MetricQuery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_or_default("perfdata-influxdb.toml");
//!     let client = Client::new(&config)?;
//!
//!     let query = MetricQuery::from_duration(
//!         "web01", "ping4", "ping4", chrono::Utc::now(), "PT12H", false,
//!     )
//!     .with_exclude(["pl"]);
//!
//!     for dataset in client.get_metrics(&query).await?.datasets() {
//!         println!("{} ({}): {:?}", dataset.metric_name, dataset.unit, dataset.series_names());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod downsample;
pub mod duration;
pub mod error;
pub mod parser;
pub mod query;
pub mod response;
pub mod transform;
pub mod types;

// Re-export main types at crate root
pub use client::{Client, HttpTransport, QueryRequest, StatusReport, Transport};
pub use config::Config;
pub use downsample::{MetricCounts, aggregate_window};
pub use error::{Error, Result};
pub use query::QueryBuilder;
pub use response::{Dataset, Response, Series};
pub use transform::{is_excluded, is_included, transform};
pub use types::{MetricQuery, Record, SelectorConfig};

// Re-export parser for advanced use cases
pub use parser::{CsvRecordParser, RecordStream, decode};
