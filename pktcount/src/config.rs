use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::ebpf::loader::XdpMode;
use crate::iface::InterfaceFilter;

/// Daemon configuration loaded from ~/.config/pktcount/config.toml.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub interfaces: InterfacesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// How often each interface's counter is read, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Compiled `pktcount-ebpf` object.
    #[serde(default = "default_program_path")]
    pub program_path: PathBuf,
    #[serde(default)]
    pub xdp_mode: XdpMode,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            program_path: default_program_path(),
            xdp_mode: XdpMode::default(),
        }
    }
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_program_path() -> PathBuf {
    PathBuf::from("pktcount-ebpf/target/bpfel-unknown-none/release/pktcount-ebpf")
}

/// Which interfaces get a worker. Empty `include` means all of them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterfacesConfig {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Config {
    /// Load config from `path`, or from the default location when `None`.
    ///
    /// A missing default file yields defaults; a missing explicit file is
    /// an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (config_path(), false),
        };
        if !explicit && !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing config from {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.general.poll_interval_ms == 0 {
            bail!("general.poll_interval_ms must be greater than zero");
        }
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.general.poll_interval_ms)
    }

    pub fn interface_filter(&self) -> InterfaceFilter {
        InterfaceFilter {
            include: self.interfaces.include.clone(),
            exclude: self.interfaces.exclude.clone(),
        }
    }
}

fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("pktcount")
        .join("config.toml")
}
