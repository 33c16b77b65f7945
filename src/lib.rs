//! COVID-19 data tracker.
//!
//! Loads the Our World in Data COVID-19 dataset, restricts it to a whitelist
//! of entities and columns, cleans it, derives case-fatality and vaccination
//! rates and extracts headline insights from the result.
//!
//! ```no_run
//! use covid_tracker::prelude::*;
//!
//! # fn run() -> TrackerResult<()> {
//! let config = TrackerConfig::default();
//! config.validate()?;
//!
//! let raw = load_observations(&config.data_path)?;
//! let table = prepare(&raw, &config)?;
//! let insights = Insights::extract(&table)?;
//! println!("{insights}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod prelude;
pub mod report;
