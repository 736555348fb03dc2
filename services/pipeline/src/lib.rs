//! Pipeline glue: configuration, field documents and stage commands.

pub mod commands;
pub mod config;
pub mod config_loader;
pub mod field_io;

pub use config::PipelineConfig;
pub use config_loader::load_config;
