pub mod dataset;
pub mod value;

pub use dataset::Dataset;
pub use value::Value;
