//! Slave configuration, normally read from a TOML file.
//!
//! Every section has defaults, so an empty file is a valid configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::memory::{RamMemory, SimFlash};
use crate::program::{Sector, default_sectors};
use crate::protocol::constants::{DEFAULT_REQUEST_ID, DEFAULT_RESPONSE_ID, MAX_SECTORS};
use crate::scheduler::{EventChannelConfig, default_event_channels};
use crate::security::SecurityConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaveConfig {
    pub transport: TransportConfig,
    pub security: SecurityConfig,
    pub memory: MemoryConfig,
    pub program: ProgramConfig,
    pub daq: DaqConfig,
}

/// CAN interface and identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub interface: String,
    /// Master -> slave identifier.
    pub request_id: u32,
    /// Slave -> master identifier.
    pub response_id: u32,
    /// Use 29-bit identifiers.
    pub extended_ids: bool,
    pub read_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            interface: "can0".to_string(),
            request_id: DEFAULT_REQUEST_ID,
            response_id: DEFAULT_RESPONSE_ID,
            extended_ids: false,
            read_timeout_ms: 100,
        }
    }
}

/// Simulated ECU memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub base: u32,
    pub size: usize,
    /// Raw image loaded into RAM at `base`.
    pub image: Option<PathBuf>,
    pub flash_base: u32,
    pub flash_size: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            base: 0,
            size: 0x1_0000,
            image: None,
            flash_base: 0,
            flash_size: 0x1_0000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramConfig {
    pub sectors: Vec<Sector>,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            sectors: default_sectors(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaqConfig {
    pub events: Vec<EventChannelConfig>,
}

impl Default for DaqConfig {
    fn default() -> Self {
        Self {
            events: default_event_channels(),
        }
    }
}

impl SlaveConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: SlaveConfig = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml()?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.transport.request_id == self.transport.response_id {
            bail!(
                "request and response identifiers must differ (both 0x{:X})",
                self.transport.request_id
            );
        }
        if self.program.sectors.len() > MAX_SECTORS {
            bail!(
                "{} flash sectors configured, at most {} supported",
                self.program.sectors.len(),
                MAX_SECTORS
            );
        }
        let mut channels: Vec<u16> = self.daq.events.iter().map(|e| e.channel).collect();
        channels.sort_unstable();
        if channels.windows(2).any(|w| w[0] == w[1]) {
            bail!("duplicate DAQ event channel");
        }
        Ok(())
    }

    /// RAM as configured, pre-loaded from `memory.image` if set.
    pub fn build_memory(&self) -> Result<RamMemory> {
        let mem = &self.memory;
        match &mem.image {
            Some(path) => {
                let image = std::fs::read(path)
                    .with_context(|| format!("reading memory image {}", path.display()))?;
                info!(
                    path = %path.display(),
                    len = image.len(),
                    base = format!("0x{:08X}", mem.base),
                    "Loaded memory image"
                );
                Ok(RamMemory::from_image(mem.base, mem.size, &image))
            }
            None => Ok(RamMemory::new(mem.base, mem.size)),
        }
    }

    /// Erased flash as configured.
    pub fn build_flash(&self) -> SimFlash {
        SimFlash::new(self.memory.flash_base, self.memory.flash_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        let config: SlaveConfig = toml::from_str("").unwrap();
        assert_eq!(config.transport.request_id, DEFAULT_REQUEST_ID);
        assert_eq!(config.transport.response_id, DEFAULT_RESPONSE_ID);
        assert!(!config.security.enabled);
        assert_eq!(config.memory.size, 0x1_0000);
        assert_eq!(config.program.sectors, default_sectors());
        assert_eq!(config.daq.events, default_event_channels());
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_sections() {
        let text = r#"
            [transport]
            interface = "vcan0"
            request_id = 0x7E0

            [security]
            enabled = true
            secret_key = 0xCAFE

            [[daq.events]]
            channel = 3
            name = "1ms"
            period_ms = 1
        "#;
        let config: SlaveConfig = toml::from_str(text).unwrap();
        assert_eq!(config.transport.interface, "vcan0");
        assert_eq!(config.transport.request_id, 0x7E0);
        assert_eq!(config.transport.response_id, DEFAULT_RESPONSE_ID);
        assert!(config.security.enabled);
        assert!(config.security.protect_pgm);
        assert_eq!(config.security.secret_key, 0xCAFE);
        assert_eq!(config.daq.events.len(), 1);
        assert_eq!(config.daq.events[0].period_ms, 1);
    }

    #[test]
    fn test_validate() {
        let mut config = SlaveConfig::default();
        config.transport.response_id = config.transport.request_id;
        assert!(config.validate().is_err());

        let mut config = SlaveConfig::default();
        config.daq.events.push(config.daq.events[0].clone());
        assert!(config.validate().is_err());

        let mut config = SlaveConfig::default();
        config.program.sectors = vec![config.program.sectors[0]; MAX_SECTORS + 1];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("xcp-config-{}.toml", std::process::id()));
        let mut config = SlaveConfig::default();
        config.security.rng_seed = Some(7);
        config.save_to_file(&path).unwrap();

        let loaded = SlaveConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.security.rng_seed, Some(7));
        assert_eq!(loaded.program.sectors, config.program.sectors);
    }

    #[test]
    fn test_build_memory_from_image() {
        let path = std::env::temp_dir().join(format!("xcp-image-{}.bin", std::process::id()));
        std::fs::write(&path, [0xDE, 0xAD]).unwrap();
        let mut config = SlaveConfig::default();
        config.memory.image = Some(path.clone());

        let ram = config.build_memory().unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(&ram.contents()[..3], &[0xDE, 0xAD, 0x00]);

        config.memory.image = Some(PathBuf::from("/nonexistent/xcp-image.bin"));
        assert!(config.build_memory().is_err());
    }
}
