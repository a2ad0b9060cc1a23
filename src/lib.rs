//! koalad library core functionality

pub mod audio;
pub mod config;
pub mod ipc;
pub mod player;
pub mod ui;

/// Initialize the application directories
pub fn init_app_dirs() -> std::io::Result<()> {
    if let Some(config_dir) = config::Settings::default_path().parent() {
        if !config_dir.exists() {
            std::fs::create_dir_all(config_dir)?;
        }
    }
    Ok(())
}
