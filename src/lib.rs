//! # SQL Draw Engine
//!
//! Pick winners from an uploaded table using a condition written in plain
//! language. The condition is translated to SQL by a language model, the SQL
//! is executed read-only against the in-memory table, and winners are drawn
//! from the matching rows with a recorded seed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sql_draw_engine::{DrawConfig, DrawSession, QueryTranslator};
//!
//! # async fn run(bytes: &[u8]) -> sql_draw_engine::DrawResult<()> {
//! let config = DrawConfig::from_env()?;
//! let mut session = DrawSession::from_upload(bytes, &config)?;
//! let translator = QueryTranslator::from_config(&config)?;
//!
//! session.filter("members aged 30 or older", &translator).await?;
//! if let Some(draw) = session.draw(3, None)? {
//!     println!("seed {}: {} winners", draw.seed, draw.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline
//!
//! - **Ingestion**: workbook or CSV upload into an arrow-backed `Dataset`
//! - **Alias resolution**: extra column names from a two-column mapping table
//! - **Translation**: schema summary + condition to one SELECT statement
//! - **Execution**: single-relation, read-only SQL evaluation
//! - **Sampling**: seeded, without replacement

pub mod config;
pub mod error;
pub mod ingestion;
pub mod llm;
pub mod query;
pub mod result_format;
pub mod sampler;
pub mod session;
pub mod storage;

// Public API - Main types users need
pub use config::DrawConfig;
pub use error::{DrawError, DrawResult};
pub use ingestion::{AliasMapping, AliasReport, MappingOrientation};
pub use llm::{CompletionBackend, QueryTranslator, TranslatedQuery};
pub use query::{FilteredResult, QueryExecutor};
pub use sampler::{Draw, DrawSeed, ReproducibleSampler};
pub use session::DrawSession;
pub use storage::{Dataset, Value};
