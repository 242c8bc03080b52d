//! Application configuration management.

use std::path::{Path, PathBuf};

use color_eyre::Result;
use serde::{Deserialize, Serialize};

use crate::client::Quality;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Local library configuration
    #[serde(default)]
    pub library: LibraryConfig,

    /// Online catalog configuration
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Player configuration
    #[serde(default)]
    pub player: PlayerConfig,
}

/// Local library locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Music library directory; downloads land here too
    #[serde(default = "default_music_dir")]
    pub music_dir: PathBuf,

    /// Recoverable-delete directory
    #[serde(default = "default_trash_dir")]
    pub trash_dir: PathBuf,

    /// Playlist store file
    #[serde(default = "default_playlists_file")]
    pub playlists_file: PathBuf,
}

/// Online catalog endpoints and quality tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_search_url")]
    pub search_url: String,

    #[serde(default = "default_details_url")]
    pub details_url: String,

    #[serde(default = "default_lyrics_url")]
    pub lyrics_url: String,

    /// Quality tier for online streaming playback (lower saves bandwidth)
    #[serde(default = "default_play_quality")]
    pub play_quality: Quality,

    /// Quality tier requested for downloads
    #[serde(default = "default_download_quality")]
    pub download_quality: Quality,
}

/// Player configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// External decoder binary
    #[serde(default = "default_player_binary")]
    pub binary: String,

    /// Seek step in seconds
    #[serde(default = "default_seek_seconds")]
    pub seek_seconds: u32,
}

fn default_music_dir() -> PathBuf {
    dirs::audio_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Music")))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_trash_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tunehub")
        .join("trash")
}

fn default_playlists_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tunehub")
        .join("playlists.json")
}

fn default_search_url() -> String {
    String::from("https://music.163.com/api/search/get/")
}

fn default_details_url() -> String {
    String::from("https://api.vkeys.cn/v2/music/netease")
}

fn default_lyrics_url() -> String {
    String::from("https://api.vkeys.cn/v2/music/netease/lyric")
}

fn default_play_quality() -> Quality {
    Quality::Low
}

fn default_download_quality() -> Quality {
    Quality::High
}

fn default_player_binary() -> String {
    String::from("ffplay")
}

fn default_seek_seconds() -> u32 {
    5
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            music_dir: default_music_dir(),
            trash_dir: default_trash_dir(),
            playlists_file: default_playlists_file(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            details_url: default_details_url(),
            lyrics_url: default_lyrics_url(),
            play_quality: default_play_quality(),
            download_quality: default_download_quality(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            binary: default_player_binary(),
            seek_seconds: default_seek_seconds(),
        }
    }
}

impl Config {
    /// Get the configuration file path.
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| color_eyre::eyre::eyre!("Could not determine config directory"))?;

        Ok(config_dir.join("tunehub").join("config.toml"))
    }

    /// Load configuration from the default location, falling back to defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific file, falling back to defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Save configuration to file.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_deserializes_with_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.player.binary, "ffplay");
        assert_eq!(config.catalog.download_quality, Quality::High);
        assert_eq!(config.player.seek_seconds, 5);
    }

    #[test]
    fn quality_tiers_round_trip_through_toml() {
        let config: Config = toml::from_str(
            "[catalog]\nplay_quality = \"standard\"\ndownload_quality = \"lossless\"\n",
        )
        .unwrap();
        assert_eq!(config.catalog.play_quality, Quality::Standard);
        assert_eq!(config.catalog.download_quality, Quality::Lossless);

        let out = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&out).unwrap();
        assert_eq!(back.catalog.download_quality, Quality::Lossless);
    }
}
