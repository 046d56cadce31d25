//! User configuration stored as TOML in the platform config directory.

use crate::error::{Error, Result};
use crate::title::{DEFAULT_KEYWORDS, TitleCleaner};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "ytalbum";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Default destination folder.
    pub download_dir: PathBuf,
    /// Explicit yt-dlp binary; searched on `PATH` when unset.
    pub ytdlp_path: Option<PathBuf>,
    /// Folder holding the ffmpeg binary; the working directory when unset.
    pub ffmpeg_dir: Option<PathBuf>,
    /// Keywords that mark bracketed title annotations for removal.
    pub title_keywords: Vec<String>,
    /// Default maximum video height.
    pub video_height: u32,
    /// Default MP3 bitrate in kbps.
    pub audio_bitrate: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            ytdlp_path: None,
            ffmpeg_dir: None,
            title_keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            video_height: 1080,
            audio_bitrate: 192,
        }
    }
}

impl Config {
    /// `<config dir>/ytalbum/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not find a valid config directory.".to_string()))?;
        Ok(config_dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Reads the config at `path`.
    ///
    /// A missing or empty file is replaced by the defaults, which are written
    /// back. A malformed file is reported and the defaults are used without
    /// touching the file.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.is_file() && fs::metadata(path)?.len() != 0 {
            let content = fs::read_to_string(path)?;
            return match toml::from_str::<Config>(&content) {
                Ok(config) => Ok(config),
                Err(e) => {
                    error!("Malformed config file {}: {}", path.display(), e);
                    info!("Using default settings, fix or delete the file to silence this");
                    Ok(Config::default())
                }
            };
        }

        let config = Config::default();
        config.save(path)?;
        info!("Configuration saved to: {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let value = toml::to_string(self)?;
        fs::write(path, value)?;
        Ok(())
    }

    /// A title cleaner using the configured keywords.
    pub fn title_cleaner(&self) -> Result<TitleCleaner> {
        TitleCleaner::new(&self.title_keywords)
    }
}

fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("Downloads"))
}
