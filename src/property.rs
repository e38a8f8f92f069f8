//! Typed property table.
//!
//! The generic accessors (`Player::get_property` / `set_property`) are the
//! authoritative interface. The constants generated here add compile-time
//! types for commonly used names on top of it.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use crate::value::Value;

/// Static access mode of a property. Recorded, not enforced: the engine
/// reports violations with its own error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
  ReadOnly,
  WriteOnly,
  ReadWrite,
}

impl Access {
  pub fn is_readable(self) -> bool {
    matches!(self, Access::ReadOnly | Access::ReadWrite)
  }

  pub fn is_writable(self) -> bool {
    matches!(self, Access::WriteOnly | Access::ReadWrite)
  }
}

/// A property name tagged with the Rust type its value converts to.
pub struct Property<T> {
  name: &'static str,
  access: Access,
  _marker: PhantomData<fn() -> T>,
}

impl<T> Property<T> {
  pub const fn new(name: &'static str, access: Access) -> Self {
    Self {
      name,
      access,
      _marker: PhantomData,
    }
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn access(&self) -> Access {
    self.access
  }
}

// Manual impls: the derives would require `T: Clone` / `T: Debug`.
impl<T> Clone for Property<T> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<T> Copy for Property<T> {}

impl<T> fmt::Debug for Property<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Property")
      .field("name", &self.name)
      .field("access", &self.access)
      .finish()
  }
}

macro_rules! property_table {
  ($( $(#[$meta:meta])* $ident:ident : $ty:ty = $name:literal, $access:ident; )*) => {
    $(
      $(#[$meta])*
      pub const $ident: Property<$ty> = Property::new($name, Access::$access);
    )*

    /// Every property in the table with its access mode.
    pub const ALL: &[(&str, Access)] = &[ $( ($name, Access::$access) ),* ];
  };
}

/// Commonly used engine properties.
pub mod props {
  use super::*;

  property_table! {
    /// Pause state.
    PAUSE: bool = "pause", ReadWrite;
    /// Volume, 0-100 (values above 100 amplify).
    VOLUME: f64 = "volume", ReadWrite;
    MUTE: bool = "mute", ReadWrite;
    SPEED: f64 = "speed", ReadWrite;
    /// Playback position in seconds; recomputed by the engine on every read.
    TIME_POS: Option<f64> = "time-pos", ReadWrite;
    TIME_REMAINING: Option<f64> = "time-remaining", ReadOnly;
    PERCENT_POS: Option<f64> = "percent-pos", ReadWrite;
    DURATION: Option<f64> = "duration", ReadOnly;
    PLAYBACK_TIME: Option<f64> = "playback-time", ReadWrite;
    FILENAME: Option<String> = "filename", ReadOnly;
    PATH: Option<String> = "path", ReadOnly;
    MEDIA_TITLE: Option<String> = "media-title", ReadOnly;
    IDLE_ACTIVE: bool = "idle-active", ReadOnly;
    CORE_IDLE: bool = "core-idle", ReadOnly;
    EOF_REACHED: bool = "eof-reached", ReadOnly;
    SEEKING: bool = "seeking", ReadOnly;
    PLAYLIST: Vec<Value> = "playlist", ReadOnly;
    PLAYLIST_POS: i64 = "playlist-pos", ReadWrite;
    PLAYLIST_COUNT: i64 = "playlist-count", ReadOnly;
    TRACK_LIST: Vec<Value> = "track-list", ReadOnly;
    /// Audio track id, or "no"/"auto".
    AID: Value = "aid", ReadWrite;
    /// Subtitle track id, or "no"/"auto".
    SID: Value = "sid", ReadWrite;
    /// Video track id, or "no"/"auto".
    VID: Value = "vid", ReadWrite;
    SUB_VISIBILITY: bool = "sub-visibility", ReadWrite;
    SUB_DELAY: f64 = "sub-delay", ReadWrite;
    AUDIO_DELAY: f64 = "audio-delay", ReadWrite;
    LOOP_FILE: Value = "loop-file", ReadWrite;
    FULLSCREEN: bool = "fullscreen", ReadWrite;
    WIDTH: Option<i64> = "width", ReadOnly;
    HEIGHT: Option<i64> = "height", ReadOnly;
    VIDEO_PARAMS: Option<BTreeMap<String, Value>> = "video-params", ReadOnly;
    HWDEC: String = "hwdec", ReadWrite;
    MPV_VERSION: String = "mpv-version", ReadOnly;
    FORCE_MEDIA_TITLE: String = "force-media-title", ReadWrite;
  }
}

/// Access mode of a property known to the table.
pub fn lookup(name: &str) -> Option<Access> {
  props::ALL
    .iter()
    .find(|(n, _)| *n == name)
    .map(|(_, access)| *access)
}
