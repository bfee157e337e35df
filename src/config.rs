use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Day shape and colors, read once at startup from
/// `<config_dir>/blockday/config.yml`. A missing file means defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Total hours shown in the grid.
    pub hours_in_day: u32,
    /// Time resolution: blocks per hour.
    pub blocks_per_hour: u32,
    /// Hour of day the first block starts at.
    pub day_start_hour: u32,
    /// Length of the highlighted workday band, in hours.
    pub day_length_hours: u32,
    pub theme: Theme,
}

/// Color names accepted by ratatui's `Color::from_str` (e.g. "cyan",
/// "darkgray", "#25a065").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    pub normal_block: String,
    pub current_block: String,
    pub selected_block: String,
    pub workday_block: String,
    pub past_text: String,
    pub title_fg: String,
    pub title_bg: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            hours_in_day: 24,
            blocks_per_hour: 1,
            day_start_hour: 9,
            day_length_hours: 8,
            theme: Theme::default(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            normal_block: "darkgray".into(),
            current_block: "magenta".into(),
            selected_block: "blue".into(),
            workday_block: "red".into(),
            past_text: "gray".into(),
            title_fg: "#fffdf5".into(),
            title_bg: "#25a065".into(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "blockday").context("locating config directory")?;
    Ok(dirs.config_dir().join("config.yml"))
}

pub fn log_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "blockday").context("locating data directory")?;
    Ok(dirs.data_dir().join("blockday.log"))
}

pub fn load_config() -> Result<Config> {
    let path = config_path()?;
    if path.exists() {
        let data =
            fs::read_to_string(&path).with_context(|| format!("reading {:?}", path))?;
        let config: Config = serde_yaml::from_str(&data).context("parsing config file")?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    } else {
        tracing::info!("no config file, using defaults");
        Ok(Config::default())
    }
}

/// Write the default config out, for `blockday init`. Leaves an existing
/// file alone.
pub fn init_config() -> Result<PathBuf> {
    let path = config_path()?;
    if !path.exists() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
        }
        let serialized = serde_yaml::to_string(&Config::default()).context("serializing config")?;
        fs::write(&path, serialized).with_context(|| format!("writing {:?}", path))?;
    }
    Ok(path)
}
