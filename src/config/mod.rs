pub mod load;
pub mod model;

pub use load::load_config;
pub use model::{Config, FileConfig, Schedule, DEFAULT_LOG_MAX_BYTES};
