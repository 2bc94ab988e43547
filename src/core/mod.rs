pub mod config;
pub mod error;
pub mod media;
pub mod transcript;
pub mod video;
