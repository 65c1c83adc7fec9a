pub mod config;
pub mod files;
pub mod store;

pub use config::{load_config, save_config, Config};
pub use files::{
    atomic_write, config_file, ensure_data_dir, init_local_dir, report_file, roadmap_file,
};
#[cfg(test)]
pub use store::MemoryStore;
pub use store::{JsonStore, Store};
