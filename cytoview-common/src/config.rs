//! Configuration loading and root folder resolution
//!
//! Every configurable value resolves through the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default HTTP port for the dashboard
pub const DEFAULT_PORT: u16 = 5840;

/// Default CSV file name, relative to the root folder
pub const DEFAULT_CSV_NAME: &str = "cell-count.csv";

/// Database file name, relative to the root folder
pub const DATABASE_NAME: &str = "cytoview.db";

/// Contents of the optional TOML config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<String>,
    pub csv_path: Option<String>,
    pub port: Option<u16>,
}

/// Resolve the root folder following the 4-tier priority order
pub fn resolve_root_folder(cli_arg: Option<&str>, env_var_name: &str) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Ok(config) = load_toml_config() {
        if let Some(root_folder) = config.root_folder {
            return PathBuf::from(root_folder);
        }
    }

    // Priority 4: OS-dependent compiled default
    get_default_root_folder()
}

/// Resolve the source CSV path
///
/// The compiled default is `<root>/cell-count.csv`.
pub fn resolve_csv_path(cli_arg: Option<&str>, root_folder: &Path) -> PathBuf {
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var("CYTOVIEW_CSV") {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Ok(config) = load_toml_config() {
        if let Some(csv_path) = config.csv_path {
            return PathBuf::from(csv_path);
        }
    }

    root_folder.join(DEFAULT_CSV_NAME)
}

/// Resolve the HTTP listen port
pub fn resolve_port(cli_arg: Option<u16>) -> u16 {
    if let Some(port) = cli_arg {
        return port;
    }

    if let Ok(value) = std::env::var("CYTOVIEW_PORT") {
        if let Ok(port) = value.parse::<u16>() {
            return port;
        }
    }

    if let Ok(config) = load_toml_config() {
        if let Some(port) = config.port {
            return port;
        }
    }

    DEFAULT_PORT
}

/// Database file path inside the root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_NAME)
}

/// Locate and parse the TOML config file for the platform
pub fn load_toml_config() -> Result<TomlConfig> {
    let config_path = find_config_file()?;
    let content = std::fs::read_to_string(&config_path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", config_path.display(), e)))
}

/// Get the config file path for the platform
fn find_config_file() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        // Try ~/.config/cytoview/config.toml first, then /etc/cytoview/config.toml
        if let Some(path) = dirs::config_dir().map(|d| d.join("cytoview").join("config.toml")) {
            if path.exists() {
                return Ok(path);
            }
        }
        let system_config = PathBuf::from("/etc/cytoview/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
        Err(Error::Config("No config file found".to_string()))
    } else {
        let path = dirs::config_dir()
            .map(|d| d.join("cytoview").join("config.toml"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;
        if path.exists() {
            Ok(path)
        } else {
            Err(Error::Config(format!("Config file not found: {:?}", path)))
        }
    }
}

/// Get OS-dependent default root folder path
pub fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/cytoview (or /var/lib/cytoview for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("cytoview"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/cytoview"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/cytoview
        dirs::data_dir()
            .map(|d| d.join("cytoview"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/cytoview"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\cytoview
        dirs::data_local_dir()
            .map(|d| d.join("cytoview"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\cytoview"))
    } else {
        PathBuf::from("./cytoview_data")
    }
}
