pub mod alerts;
pub mod config;
pub mod stats;
pub mod timer;
