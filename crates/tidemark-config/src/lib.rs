pub mod loader;
pub mod model;

pub use loader::ConfigLoader;
pub use model::{
    AppConfig, DEFAULT_TABLE_NAME, DEFAULT_VERSION_COLUMN_NAME, DEFAULT_VERSION_COLUMN_SIZE,
    Options,
};
