pub mod timespan;
pub mod types;
