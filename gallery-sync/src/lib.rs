pub mod assets;
pub mod config;
pub mod logging;
pub mod pipeline;
pub mod sync;
pub mod token_provider;
