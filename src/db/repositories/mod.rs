pub mod config;
pub mod samples;

pub use config::CONFIG_TABLE;
