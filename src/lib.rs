pub mod config;
pub mod filter;
pub mod paths;
pub mod session;
pub mod similarity;
pub mod spatial;
pub mod table;

/// File extension samples are stored with
pub const SAMPLE_EXTENSION: &str = "wav";

/// Application name for XDG paths
pub const APP_NAME: &str = "samplescope";
