use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use imlink_core::error::{ImlinkError, Result};
use imlink_core::protocol::{platform, DEFAULT_MAX_BODY, DEFAULT_VERSION};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub version: u32,

    #[serde(default)]
    pub connection: ConnectionSection,

    pub device: DeviceSection,

    #[serde(default)]
    pub keepalive: KeepaliveSection,

    #[serde(default)]
    pub delivery: DeliverySection,

    #[serde(default)]
    pub sync: SyncSection,
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(ImlinkError::UnsupportedVersion);
        }

        self.connection.validate()?;
        self.device.validate()?;
        self.keepalive.validate()?;
        self.delivery.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionSection {
    #[serde(default = "default_addr")]
    pub addr: String,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_auth_timeout_ms")]
    pub auth_timeout_ms: u64,

    #[serde(default = "default_protocol_version")]
    pub protocol_version: u8,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            connect_timeout_ms: default_connect_timeout_ms(),
            auth_timeout_ms: default_auth_timeout_ms(),
            protocol_version: default_protocol_version(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ConnectionSection {
    pub fn validate(&self) -> Result<()> {
        if self.addr.trim().is_empty() {
            return Err(ImlinkError::BadConfig("connection.addr must not be empty".into()));
        }
        if !(100..=120000).contains(&self.connect_timeout_ms) {
            return Err(ImlinkError::BadConfig(
                "connection.connect_timeout_ms must be between 100 and 120000".into(),
            ));
        }
        if !(100..=120000).contains(&self.auth_timeout_ms) {
            return Err(ImlinkError::BadConfig(
                "connection.auth_timeout_ms must be between 100 and 120000".into(),
            ));
        }
        if self.protocol_version > DEFAULT_VERSION {
            return Err(ImlinkError::BadConfig(format!(
                "connection.protocol_version must be at most {DEFAULT_VERSION}"
            )));
        }
        if !(1..=32 * 1024 * 1024).contains(&self.max_body_bytes) {
            return Err(ImlinkError::BadConfig(
                "connection.max_body_bytes must be between 1 and 33554432".into(),
            ));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceSection {
    #[serde(default = "default_platform_id")]
    pub platform_id: u8,

    pub device_id: String,
}

impl DeviceSection {
    pub fn validate(&self) -> Result<()> {
        if !(platform::IOS..=platform::SERVER).contains(&self.platform_id) {
            return Err(ImlinkError::BadConfig(
                "device.platform_id must be between 1 and 4".into(),
            ));
        }
        if self.device_id.is_empty() {
            return Err(ImlinkError::BadConfig("device.device_id must not be empty".into()));
        }
        if self.device_id.len() > 255 {
            return Err(ImlinkError::BadConfig(
                "device.device_id must be at most 255 bytes".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeepaliveSection {
    #[serde(default = "default_idle_interval_ms")]
    pub idle_interval_ms: u64,
}

impl Default for KeepaliveSection {
    fn default() -> Self {
        Self {
            idle_interval_ms: default_idle_interval_ms(),
        }
    }
}

impl KeepaliveSection {
    pub fn validate(&self) -> Result<()> {
        if !(5000..=600000).contains(&self.idle_interval_ms) {
            return Err(ImlinkError::BadConfig(
                "keepalive.idle_interval_ms must be between 5000 and 600000".into(),
            ));
        }
        Ok(())
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeliverySection {
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,

    #[serde(default = "default_queue")]
    pub outbound_queue: usize,

    #[serde(default = "default_queue")]
    pub event_queue: usize,
}

impl Default for DeliverySection {
    fn default() -> Self {
        Self {
            ack_timeout_ms: default_ack_timeout_ms(),
            outbound_queue: default_queue(),
            event_queue: default_queue(),
        }
    }
}

impl DeliverySection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=300000).contains(&self.ack_timeout_ms) {
            return Err(ImlinkError::BadConfig(
                "delivery.ack_timeout_ms must be between 100 and 300000".into(),
            ));
        }
        if self.outbound_queue == 0 || self.event_queue == 0 {
            return Err(ImlinkError::BadConfig(
                "delivery queues must hold at least one item".into(),
            ));
        }
        Ok(())
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncSection {
    /// Persist cursors here; in-memory only when absent.
    #[serde(default)]
    pub cursor_file: Option<PathBuf>,

    /// Groups synced from the first connect on.
    #[serde(default)]
    pub groups: Vec<i64>,
}

fn default_addr() -> String {
    "127.0.0.1:23000".into()
}
fn default_connect_timeout_ms() -> u64 {
    10000
}
fn default_auth_timeout_ms() -> u64 {
    10000
}
fn default_protocol_version() -> u8 {
    DEFAULT_VERSION
}
fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY
}
fn default_platform_id() -> u8 {
    platform::ANDROID
}
fn default_idle_interval_ms() -> u64 {
    60000
}
fn default_ack_timeout_ms() -> u64 {
    10000
}
fn default_queue() -> usize {
    1024
}
