pub mod cache;
pub mod config;
pub mod dataset;
pub mod error;
pub mod gaps;
pub mod load;
pub mod normalize;
pub mod schema;
pub mod source;
