//! Engine events, end-of-file reasons and log levels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::player::SubscriptionId;
use crate::value::Value;

/// Engine log severity, ordered from silent to most verbose.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[repr(i32)]
pub enum LogLevel {
  #[serde(rename = "no", alias = "none")]
  None = 0,
  #[serde(rename = "fatal")]
  Fatal = 10,
  #[serde(rename = "error")]
  Error = 20,
  #[serde(rename = "warn")]
  Warn = 30,
  #[default]
  #[serde(rename = "info")]
  Info = 40,
  #[serde(rename = "v", alias = "verbose")]
  Verbose = 50,
  #[serde(rename = "debug")]
  Debug = 60,
  #[serde(rename = "trace")]
  Trace = 70,
}

impl LogLevel {
  /// Name used by the engine (`request_log_messages`, `log-message` events).
  pub fn as_str(self) -> &'static str {
    match self {
      LogLevel::None => "no",
      LogLevel::Fatal => "fatal",
      LogLevel::Error => "error",
      LogLevel::Warn => "warn",
      LogLevel::Info => "info",
      LogLevel::Verbose => "v",
      LogLevel::Debug => "debug",
      LogLevel::Trace => "trace",
    }
  }

  pub fn from_raw(level: i32) -> Option<Self> {
    match level {
      0 => Some(LogLevel::None),
      10 => Some(LogLevel::Fatal),
      20 => Some(LogLevel::Error),
      30 => Some(LogLevel::Warn),
      40 => Some(LogLevel::Info),
      50 => Some(LogLevel::Verbose),
      60 => Some(LogLevel::Debug),
      70 => Some(LogLevel::Trace),
      _ => None,
    }
  }

  /// Equivalent `log` crate level; `None` has no equivalent.
  pub fn to_log_level(self) -> Option<log::Level> {
    match self {
      LogLevel::None => None,
      LogLevel::Fatal | LogLevel::Error => Some(log::Level::Error),
      LogLevel::Warn => Some(log::Level::Warn),
      LogLevel::Info => Some(log::Level::Info),
      LogLevel::Verbose | LogLevel::Debug => Some(log::Level::Debug),
      LogLevel::Trace => Some(log::Level::Trace),
    }
  }
}

impl FromStr for LogLevel {
  type Err = ErrorCode;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "no" | "none" => Ok(LogLevel::None),
      "fatal" => Ok(LogLevel::Fatal),
      "error" => Ok(LogLevel::Error),
      "warn" => Ok(LogLevel::Warn),
      "info" => Ok(LogLevel::Info),
      "v" | "verbose" => Ok(LogLevel::Verbose),
      "debug" => Ok(LogLevel::Debug),
      "trace" => Ok(LogLevel::Trace),
      _ => Err(ErrorCode::OptionFormat),
    }
  }
}

impl fmt::Display for LogLevel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Why playback of a file ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum EndFileReason {
  Eof = 0,
  Stop = 2,
  Quit = 3,
  Error = 4,
  Redirect = 5,
}

impl EndFileReason {
  pub fn from_raw(reason: i32) -> Option<Self> {
    match reason {
      0 => Some(EndFileReason::Eof),
      2 => Some(EndFileReason::Stop),
      3 => Some(EndFileReason::Quit),
      4 => Some(EndFileReason::Error),
      5 => Some(EndFileReason::Redirect),
      _ => None,
    }
  }

  /// Parse the reason string sent in `end-file` events.
  pub fn from_name(name: &str) -> Option<Self> {
    match name {
      "eof" => Some(EndFileReason::Eof),
      "stop" => Some(EndFileReason::Stop),
      "quit" => Some(EndFileReason::Quit),
      "error" => Some(EndFileReason::Error),
      "redirect" => Some(EndFileReason::Redirect),
      _ => None,
    }
  }
}

/// A log line produced by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct LogMessage {
  /// Engine subsystem that produced the message (e.g. "cplayer", "ffmpeg").
  pub prefix: String,
  pub level: LogLevel,
  pub text: String,
}

impl LogMessage {
  pub fn new(prefix: impl Into<String>, level: LogLevel, text: impl Into<String>) -> Self {
    Self {
      prefix: prefix.into(),
      level,
      text: text.into(),
    }
  }
}

/// Asynchronous notification produced by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
  FileStart,
  FileLoaded,
  FileEnd {
    reason: EndFileReason,
    /// `Success` unless `reason` is `Error`.
    error: ErrorCode,
  },
  Idle,
  VideoReconfig,
  AudioReconfig,
  Seek,
  PlaybackRestart,
  /// The event queue dropped events because the host did not drain it in time.
  QueueOverflow,
  LogMessage(LogMessage),
  PropertyChange {
    id: SubscriptionId,
    name: String,
    value: Value,
  },
}

impl Event {
  /// Engine name of the event, as used in mpv's IPC.
  pub fn name(&self) -> &'static str {
    match self {
      Event::FileStart => "start-file",
      Event::FileLoaded => "file-loaded",
      Event::FileEnd { .. } => "end-file",
      Event::Idle => "idle",
      Event::VideoReconfig => "video-reconfig",
      Event::AudioReconfig => "audio-reconfig",
      Event::Seek => "seek",
      Event::PlaybackRestart => "playback-restart",
      Event::QueueOverflow => "queue-overflow",
      Event::LogMessage(_) => "log-message",
      Event::PropertyChange { .. } => "property-change",
    }
  }
}
