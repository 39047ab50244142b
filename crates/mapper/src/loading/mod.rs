//! Graph loading: the materializer, its batch resolver and loader configuration

pub mod batch_resolver;
pub mod config;
pub mod loader;
mod traversal;


pub use batch_resolver::BatchResolver;
pub use config::LoaderConfig;
pub use loader::{GraphLoader, Materialized, OutputMode};
