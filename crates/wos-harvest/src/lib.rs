//! Web of Science Harvester
//!
//! Harvests every publication affiliated with an organization from the Web of
//! Science Starter API, flattens them to one row per (publication, author) and
//! publishes the table to files or a read-only HTTP service.
//!
//! # Features
//!
//! - **Paginated harvest**: page 1 sizes the query, later pages fan out with bounded concurrency
//! - **429 backoff**: capped exponential backoff per page, failed pages reported, never fatal
//! - **File sinks**: JSON and CSV, split into part files above the spreadsheet row ceiling
//! - **HTTP service**: atomically swapped table cache with summaries and rankings
//! - **Questions**: keyword column classifier plus an OpenAI-compatible model
//!
//! # Example
//!
//! ```no_run
//! use wos_harvest::{config::Config, pipeline, WosClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let client = WosClient::new(&config)?;
//!
//!     let organizations = wos_harvest::config::organizations();
//!     let batch = pipeline::run_batch(&client, &config, organizations, Default::default()).await;
//!     println!("{} tables, {} failed", batch.tables.len(), batch.failed.len());
//!     Ok(())
//! }
//! ```

pub mod ask;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod server;
pub mod stats;

pub use client::WosClient;
pub use config::Config;
pub use error::{AskError, ClientError, PipelineError};
