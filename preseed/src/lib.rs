pub mod prompt;

pub use prompt::TerminalPrompter;

// Re-export commonly used types
pub use preseed_core::{
    config::PlannerConfig,
    error::{PreseedError, PreseedResult},
    types::InitConfig,
};

use std::path::{Path, PathBuf};

/// Planner configuration from an optional TOML file, environment variables
/// and command-line overrides, in increasing precedence.
pub fn load_settings(
    config: Option<&Path>,
    data_dir: Option<PathBuf>,
    socket: Option<PathBuf>,
) -> PreseedResult<PlannerConfig> {
    let mut settings = PlannerConfig::load(config)?;

    if let Some(data_dir) = data_dir {
        settings.data_dir = data_dir;
    }
    if let Some(socket) = socket {
        settings.unix_socket = Some(socket);
    }

    settings.validate()?;
    Ok(settings)
}
