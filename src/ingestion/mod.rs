//! Ingestion - uploaded tables and alias mappings

pub mod alias;
pub mod tabular;

pub use alias::{AliasMapping, AliasReport, MappingOrientation};
pub use tabular::{load_dataset, load_table, RawTable, TabularFormat};
