//! Host callbacks and player construction options.

use crate::config::PlayerConfig;
use crate::error::ErrorCode;
use crate::event::{EndFileReason, Event, LogLevel, LogMessage};

type Callback = Box<dyn FnMut()>;

/// Callbacks invoked on the host thread from `Player::dispatch_events`.
#[derive(Default)]
pub(crate) struct PlayerCallbacks {
  on_log: Option<Box<dyn FnMut(&LogMessage)>>,
  on_file_start: Option<Callback>,
  on_file_end: Option<Box<dyn FnMut(EndFileReason, ErrorCode)>>,
  on_file_loaded: Option<Callback>,
  on_idle: Option<Callback>,
  on_video_reconfig: Option<Callback>,
  on_audio_reconfig: Option<Callback>,
  on_seek: Option<Callback>,
  on_playback_restart: Option<Callback>,
  on_queue_overflow: Option<Callback>,
}

fn call(callback: &mut Option<Callback>) {
  if let Some(callback) = callback {
    callback();
  }
}

impl PlayerCallbacks {
  /// Route an event to its callback. Property changes are not handled here.
  pub(crate) fn dispatch(&mut self, event: &Event) {
    match event {
      Event::FileStart => call(&mut self.on_file_start),
      Event::FileLoaded => call(&mut self.on_file_loaded),
      Event::FileEnd { reason, error } => {
        if let Some(callback) = &mut self.on_file_end {
          callback(*reason, *error);
        }
      }
      Event::Idle => call(&mut self.on_idle),
      Event::VideoReconfig => call(&mut self.on_video_reconfig),
      Event::AudioReconfig => call(&mut self.on_audio_reconfig),
      Event::Seek => call(&mut self.on_seek),
      Event::PlaybackRestart => call(&mut self.on_playback_restart),
      Event::QueueOverflow => call(&mut self.on_queue_overflow),
      Event::LogMessage(message) => self.log(message),
      Event::PropertyChange { .. } => {}
    }
  }

  /// Hand a log line to `on_log`, or to the `log` facade when unset.
  pub(crate) fn log(&mut self, message: &LogMessage) {
    match &mut self.on_log {
      Some(callback) => callback(message),
      None => {
        if let Some(level) = message.level.to_log_level() {
          log::log!(target: "mpv", level, "[{}] {}", message.prefix, message.text);
        }
      }
    }
  }
}

/// Everything needed to construct a player besides its surface and engine.
///
/// ```ignore
/// let options = PlayerOptions::new()
///   .log_level(LogLevel::Warn)
///   .on_file_end(|reason, error| println!("ended: {:?} {}", reason, error));
/// ```
#[derive(Default)]
pub struct PlayerOptions {
  pub(crate) config: PlayerConfig,
  pub(crate) callbacks: PlayerCallbacks,
}

impl PlayerOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn config(mut self, config: PlayerConfig) -> Self {
    self.config = config;
    self
  }

  /// Minimum engine log level delivered to `on_log`.
  pub fn log_level(mut self, level: LogLevel) -> Self {
    self.config.log_level = level;
    self
  }

  pub fn on_log(mut self, f: impl FnMut(&LogMessage) + 'static) -> Self {
    self.callbacks.on_log = Some(Box::new(f));
    self
  }

  pub fn on_file_start(mut self, f: impl FnMut() + 'static) -> Self {
    self.callbacks.on_file_start = Some(Box::new(f));
    self
  }

  pub fn on_file_end(mut self, f: impl FnMut(EndFileReason, ErrorCode) + 'static) -> Self {
    self.callbacks.on_file_end = Some(Box::new(f));
    self
  }

  pub fn on_file_loaded(mut self, f: impl FnMut() + 'static) -> Self {
    self.callbacks.on_file_loaded = Some(Box::new(f));
    self
  }

  pub fn on_idle(mut self, f: impl FnMut() + 'static) -> Self {
    self.callbacks.on_idle = Some(Box::new(f));
    self
  }

  pub fn on_video_reconfig(mut self, f: impl FnMut() + 'static) -> Self {
    self.callbacks.on_video_reconfig = Some(Box::new(f));
    self
  }

  pub fn on_audio_reconfig(mut self, f: impl FnMut() + 'static) -> Self {
    self.callbacks.on_audio_reconfig = Some(Box::new(f));
    self
  }

  pub fn on_seek(mut self, f: impl FnMut() + 'static) -> Self {
    self.callbacks.on_seek = Some(Box::new(f));
    self
  }

  pub fn on_playback_restart(mut self, f: impl FnMut() + 'static) -> Self {
    self.callbacks.on_playback_restart = Some(Box::new(f));
    self
  }

  /// Called once per drain that follows dropped events.
  pub fn on_queue_overflow(mut self, f: impl FnMut() + 'static) -> Self {
    self.callbacks.on_queue_overflow = Some(Box::new(f));
    self
  }
}
