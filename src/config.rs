//! Player and engine configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::event::LogLevel;

/// Binding-level configuration for a single player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerConfig {
  /// Minimum severity of engine log messages requested at creation.
  #[serde(default)]
  pub log_level: LogLevel,

  /// Maximum number of commands waiting for the engine.
  #[serde(default = "default_command_queue_capacity")]
  pub command_queue_capacity: usize,

  /// Maximum number of undelivered engine events.
  #[serde(default = "default_event_queue_capacity")]
  pub event_queue_capacity: usize,

  /// How long `create()` waits for the engine to come up.
  #[serde(default = "default_startup_timeout_ms")]
  pub startup_timeout_ms: u64,

  /// How long `dispose()` waits for in-flight commands to drain.
  #[serde(default = "default_dispose_timeout_ms")]
  pub dispose_timeout_ms: u64,
}

fn default_command_queue_capacity() -> usize {
  64
}

fn default_event_queue_capacity() -> usize {
  1000
}

fn default_startup_timeout_ms() -> u64 {
  10_000
}

fn default_dispose_timeout_ms() -> u64 {
  2_000
}

impl Default for PlayerConfig {
  fn default() -> Self {
    Self {
      log_level: LogLevel::default(),
      command_queue_capacity: default_command_queue_capacity(),
      event_queue_capacity: default_event_queue_capacity(),
      startup_timeout_ms: default_startup_timeout_ms(),
      dispose_timeout_ms: default_dispose_timeout_ms(),
    }
  }
}

impl PlayerConfig {
  /// Parse a configuration from JSON; missing fields take their defaults.
  pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }

  /// Validate configuration values.
  pub fn validate(&self) -> Result<(), String> {
    if self.command_queue_capacity < 1 || self.command_queue_capacity > 4096 {
      return Err("Command queue capacity must be between 1 and 4096".to_string());
    }
    if self.event_queue_capacity < 16 || self.event_queue_capacity > 65_536 {
      return Err("Event queue capacity must be between 16 and 65536".to_string());
    }
    if self.startup_timeout_ms < 1 || self.startup_timeout_ms > 60_000 {
      return Err("Startup timeout must be between 1 and 60000 ms".to_string());
    }
    if self.dispose_timeout_ms < 1 || self.dispose_timeout_ms > 60_000 {
      return Err("Dispose timeout must be between 1 and 60000 ms".to_string());
    }
    Ok(())
  }

  pub fn startup_timeout(&self) -> Duration {
    Duration::from_millis(self.startup_timeout_ms)
  }

  pub fn dispose_timeout(&self) -> Duration {
    Duration::from_millis(self.dispose_timeout_ms)
  }
}

/// Configuration of the external mpv process backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MpvConfig {
  /// Custom mpv executable path (None = auto-detect).
  #[serde(default)]
  pub mpv_path: Option<String>,

  /// Additional mpv command-line arguments.
  #[serde(default)]
  pub mpv_args: Vec<String>,

  /// Initial engine options, passed as `--key=value`.
  #[serde(default = "default_options")]
  pub options: BTreeMap<String, String>,

  /// Round-trip timeout for a single IPC request.
  #[serde(default = "default_ipc_timeout_ms")]
  pub ipc_timeout_ms: u64,

  /// Number of IPC connection attempts after spawning mpv.
  #[serde(default = "default_connect_retries")]
  pub connect_retries: u32,

  /// Directory for IPC sockets (None = runtime dir, then temp dir).
  #[serde(default)]
  pub socket_dir: Option<String>,
}

fn default_options() -> BTreeMap<String, String> {
  let mut options = BTreeMap::new();
  options.insert("hwdec".to_string(), "no".to_string());
  options.insert("sub-auto".to_string(), "no".to_string());
  options
}

fn default_ipc_timeout_ms() -> u64 {
  5_000
}

fn default_connect_retries() -> u32 {
  10
}

impl Default for MpvConfig {
  fn default() -> Self {
    Self {
      mpv_path: None,
      mpv_args: Vec::new(),
      options: default_options(),
      ipc_timeout_ms: default_ipc_timeout_ms(),
      connect_retries: default_connect_retries(),
      socket_dir: None,
    }
  }
}

impl MpvConfig {
  pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }

  /// Validate configuration values.
  pub fn validate(&self) -> Result<(), String> {
    if self.ipc_timeout_ms < 1 || self.ipc_timeout_ms > 60_000 {
      return Err("IPC timeout must be between 1 and 60000 ms".to_string());
    }
    if self.connect_retries < 1 || self.connect_retries > 100 {
      return Err("Connect retries must be between 1 and 100".to_string());
    }
    if self.options.keys().any(|k| k.trim().is_empty() || k.starts_with('-')) {
      return Err("Option names must be non-empty and given without leading dashes".to_string());
    }
    Ok(())
  }

  pub fn ipc_timeout(&self) -> Duration {
    Duration::from_millis(self.ipc_timeout_ms)
  }

  /// Configured mpv path, ignoring empty strings.
  pub fn mpv_path(&self) -> Option<PathBuf> {
    self
      .mpv_path
      .as_ref()
      .filter(|s| !s.is_empty())
      .map(PathBuf::from)
  }

  /// Directory the IPC socket is created in.
  pub fn socket_dir(&self) -> PathBuf {
    self
      .socket_dir
      .as_ref()
      .filter(|s| !s.is_empty())
      .map(PathBuf::from)
      .or_else(dirs::runtime_dir)
      .unwrap_or_else(std::env::temp_dir)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_player_config_defaults_from_empty_json() {
    let config = PlayerConfig::from_json_str("{}").unwrap();
    assert_eq!(config, PlayerConfig::default());
    assert_eq!(config.log_level, LogLevel::Info);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_player_config_camel_case() {
    let config =
      PlayerConfig::from_json_str(r#"{"logLevel":"debug","commandQueueCapacity":8}"#).unwrap();
    assert_eq!(config.log_level, LogLevel::Debug);
    assert_eq!(config.command_queue_capacity, 8);
    assert_eq!(config.event_queue_capacity, 1000);
  }

  #[test]
  fn test_player_config_validation() {
    let mut config = PlayerConfig::default();
    config.command_queue_capacity = 0;
    assert!(config.validate().is_err());

    let mut config = PlayerConfig::default();
    config.event_queue_capacity = 4;
    assert!(config.validate().is_err());

    let mut config = PlayerConfig::default();
    config.dispose_timeout_ms = 0;
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_mpv_config() {
    let config = MpvConfig::from_json_str(r#"{"mpvPath":"","mpvArgs":["--mute=yes"]}"#).unwrap();
    assert_eq!(config.mpv_path(), None);
    assert_eq!(config.mpv_args, vec!["--mute=yes".to_string()]);
    assert_eq!(config.options.get("sub-auto").map(String::as_str), Some("no"));
    assert!(config.validate().is_ok());

    let mut config = MpvConfig::default();
    config.options.insert("--vo".to_string(), "gpu".to_string());
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_socket_dir_override() {
    let config = MpvConfig {
      socket_dir: Some("/run/custom".to_string()),
      ..MpvConfig::default()
    };
    assert_eq!(config.socket_dir(), PathBuf::from("/run/custom"));
  }
}
