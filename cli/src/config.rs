//! Configuration management for the pcmix CLI.
//!
//! Configuration is stored in ~/.pcmix/{app_name}/config.yaml and holds
//! named mixing profiles.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pcmix_audio::pcm::{Format, LabelVolumes, MixerOptions, StreamOptions, VolumeCurve};
use serde::{Deserialize, Serialize};

/// Default base configuration directory name.
pub const DEFAULT_BASE_DIR: &str = ".pcmix";
/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Application name (not serialized).
    #[serde(skip)]
    pub app_name: String,

    /// Name of the currently active profile.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_profile: String,

    /// Map of profile name to profile.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub profiles: BTreeMap<String, Profile>,

    /// Path to the config file (not serialized).
    #[serde(skip)]
    config_path: PathBuf,
}

/// Output format and mixing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Profile name.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,

    pub sample_rate: u32,
    pub channels: u16,
    pub bitdepth: u32,

    pub volume_curve: VolumeCurve,

    /// Streaming segment length in milliseconds.
    pub segment_ms: u64,

    /// Accept packed 24-bit samples.
    pub packed_24bit: bool,

    /// Target volume per track label.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, f64>,

    /// Fade-in for new labelled tracks, in milliseconds.
    pub fade_in_ms: u64,

    /// Fade for label volume changes, in milliseconds.
    pub change_fade_ms: u64,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: String::new(),
            sample_rate: 48000,
            channels: 2,
            bitdepth: 16,
            volume_curve: VolumeCurve::default(),
            segment_ms: 50,
            packed_24bit: true,
            labels: BTreeMap::new(),
            fade_in_ms: LabelVolumes::DEFAULT_FADE_IN.as_millis() as u64,
            change_fade_ms: LabelVolumes::DEFAULT_CHANGE_FADE.as_millis() as u64,
        }
    }
}

impl Profile {
    /// Returns the PCM format of this profile.
    pub fn format(&self) -> anyhow::Result<Format> {
        Ok(Format::new(self.sample_rate, self.channels, self.bitdepth)?)
    }

    /// Returns the mixer options of this profile.
    pub fn mixer_options(&self) -> MixerOptions {
        let opts = MixerOptions::default().with_volume_curve(self.volume_curve);
        if self.packed_24bit {
            opts
        } else {
            opts.without_packed_24bit()
        }
    }

    /// Returns streaming options (callbacks unset).
    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions::default()
            .with_segment(Duration::from_millis(self.segment_ms))
            .with_mixer(self.mixer_options())
    }

    /// Builds the label volume policy of this profile.
    pub fn label_volumes(&self) -> anyhow::Result<LabelVolumes> {
        if let Some((label, v)) = self.labels.iter().find(|(_, v)| !(0.0..=1.0).contains(*v)) {
            anyhow::bail!("label '{}' volume {} is outside 0..1", label, v);
        }
        Ok(LabelVolumes::new(self.labels.clone())
            .with_fade_in(Duration::from_millis(self.fade_in_ms))
            .with_change_fade(Duration::from_millis(self.change_fade_ms)))
    }
}

impl Config {
    /// Gets the default config directory.
    pub fn default_config_dir(app_name: &str) -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_BASE_DIR).join(app_name))
    }

    /// Gets the default config file path.
    pub fn default_config_path(app_name: &str) -> Option<PathBuf> {
        Self::default_config_dir(app_name).map(|dir| dir.join(DEFAULT_CONFIG_FILE))
    }

    /// Returns the config file path.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Saves the configuration to disk.
    pub fn save(&self) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&self.config_path, content)?;
        Ok(())
    }

    /// Adds or replaces a profile.
    pub fn add_profile(&mut self, name: &str, mut profile: Profile) -> anyhow::Result<()> {
        let format = profile.format()?;
        if format.bitdepth() == 24 && !profile.packed_24bit {
            anyhow::bail!("profile '{}' is 24-bit but disables 24-bit audio", name);
        }
        profile.label_volumes()?;
        profile.name = name.to_string();
        self.profiles.insert(name.to_string(), profile);
        self.save()
    }

    /// Deletes a profile.
    pub fn delete_profile(&mut self, name: &str) -> anyhow::Result<()> {
        if self.profiles.remove(name).is_none() {
            anyhow::bail!("profile '{}' not found", name);
        }
        if self.current_profile == name {
            self.current_profile.clear();
        }
        self.save()
    }

    /// Sets the current profile.
    pub fn use_profile(&mut self, name: &str) -> anyhow::Result<()> {
        if !self.profiles.contains_key(name) {
            anyhow::bail!("profile '{}' not found", name);
        }
        self.current_profile = name.to_string();
        self.save()
    }

    /// Gets a specific profile.
    pub fn get_profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    /// Resolves the profile by name, or the current profile if name is
    /// empty.
    pub fn resolve_profile(&self, name: Option<&str>) -> Option<&Profile> {
        match name {
            Some(n) if !n.is_empty() => self.get_profile(n),
            _ if self.current_profile.is_empty() => None,
            _ => self.profiles.get(&self.current_profile),
        }
    }

    /// Resolves a profile like [`resolve_profile`](Self::resolve_profile),
    /// falling back to the built-in defaults when none is configured.
    pub fn profile_or_default(&self, name: Option<&str>) -> anyhow::Result<Profile> {
        match (name, self.resolve_profile(name)) {
            (_, Some(p)) => Ok(p.clone()),
            (Some(n), None) if !n.is_empty() => anyhow::bail!("profile '{}' not found", n),
            _ => Ok(Profile::default()),
        }
    }

    /// Lists all profile names.
    pub fn list_profiles(&self) -> Vec<&str> {
        self.profiles.keys().map(|s| s.as_str()).collect()
    }
}

/// Loads configuration for the specified app.
pub fn load_config(app_name: &str, custom_path: Option<&str>) -> anyhow::Result<Config> {
    let config_path = match custom_path {
        Some(p) => PathBuf::from(p),
        None => Config::default_config_path(app_name)
            .ok_or_else(|| anyhow::anyhow!("cannot determine config path"))?,
    };

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut cfg: Config = if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        serde_yaml::from_str(&content)?
    } else {
        let cfg = Config::default();
        let content = serde_yaml::to_string(&cfg)?;
        std::fs::write(&config_path, content)?;
        cfg
    };

    cfg.app_name = app_name.to_string();
    cfg.config_path = config_path;

    Ok(cfg)
}
