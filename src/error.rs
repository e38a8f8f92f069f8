//! Error codes shared by every fallible player operation.

use thiserror::Error;

/// Result type for player operations.
pub type Result<T> = std::result::Result<T, ErrorCode>;

/// Closed set of engine error codes.
///
/// Values below zero are failure kinds. Codes the engine may add later and
/// that are not listed here map to [`ErrorCode::Generic`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
  #[error("success")]
  Success = 0,
  #[error("event queue full")]
  QueueFull = -1,
  #[error("memory allocation failed")]
  NoMem = -2,
  #[error("core not initialized")]
  Uninitialized = -3,
  #[error("invalid parameter")]
  InvalidParameter = -4,
  #[error("option not found")]
  OptionNotFound = -5,
  #[error("unsupported format for accessing option")]
  OptionFormat = -6,
  #[error("error setting option")]
  OptionError = -7,
  #[error("property not found")]
  PropertyNotFound = -8,
  #[error("unsupported format for accessing property")]
  PropertyFormat = -9,
  #[error("property unavailable")]
  PropertyUnavailable = -10,
  #[error("error accessing property")]
  PropertyError = -11,
  #[error("error running command")]
  Command = -12,
  #[error("loading failed")]
  LoadingFailed = -13,
  #[error("audio output initialization failed")]
  AoInitFailed = -14,
  #[error("video output initialization failed")]
  VoInitFailed = -15,
  #[error("no audio or video data played")]
  NothingToPlay = -16,
  #[error("unrecognized file format")]
  UnknownFormat = -17,
  #[error("not supported")]
  Unsupported = -18,
  #[error("operation not implemented")]
  NotImplemented = -19,
  #[error("something happened")]
  Generic = -20,
}

/// Coarse grouping of error codes by where they originate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
  /// Not an error.
  None,
  /// Operation attempted outside the `Initialized` state.
  Lifecycle,
  /// Resource exhaustion at the binding boundary.
  Admission,
  /// Malformed request.
  Validation,
  /// Unknown, unavailable or mistyped property.
  Property,
  /// Failure inside command execution or a media subsystem.
  Engine,
}

const ALL_CODES: [ErrorCode; 21] = [
  ErrorCode::Success,
  ErrorCode::QueueFull,
  ErrorCode::NoMem,
  ErrorCode::Uninitialized,
  ErrorCode::InvalidParameter,
  ErrorCode::OptionNotFound,
  ErrorCode::OptionFormat,
  ErrorCode::OptionError,
  ErrorCode::PropertyNotFound,
  ErrorCode::PropertyFormat,
  ErrorCode::PropertyUnavailable,
  ErrorCode::PropertyError,
  ErrorCode::Command,
  ErrorCode::LoadingFailed,
  ErrorCode::AoInitFailed,
  ErrorCode::VoInitFailed,
  ErrorCode::NothingToPlay,
  ErrorCode::UnknownFormat,
  ErrorCode::Unsupported,
  ErrorCode::NotImplemented,
  ErrorCode::Generic,
];

impl ErrorCode {
  /// Map a raw engine status code. Non-negative codes are success.
  pub fn from_raw(code: i32) -> Self {
    if code >= 0 {
      return ErrorCode::Success;
    }
    ALL_CODES
      .iter()
      .copied()
      .find(|c| c.as_raw() == code)
      .unwrap_or(ErrorCode::Generic)
  }

  /// Raw integer value of this code.
  pub fn as_raw(self) -> i32 {
    self as i32
  }

  pub fn is_success(self) -> bool {
    self == ErrorCode::Success
  }

  /// Map an engine error message (as sent over mpv's JSON IPC) back to a code.
  ///
  /// Unknown messages map to [`ErrorCode::Generic`].
  pub fn from_message(message: &str) -> Self {
    let message = message.trim();
    ALL_CODES
      .iter()
      .copied()
      .find(|c| c.to_string().eq_ignore_ascii_case(message))
      .unwrap_or(ErrorCode::Generic)
  }

  pub fn category(self) -> ErrorCategory {
    match self {
      ErrorCode::Success => ErrorCategory::None,
      ErrorCode::Uninitialized => ErrorCategory::Lifecycle,
      ErrorCode::QueueFull | ErrorCode::NoMem => ErrorCategory::Admission,
      ErrorCode::InvalidParameter
      | ErrorCode::OptionNotFound
      | ErrorCode::OptionFormat
      | ErrorCode::OptionError => ErrorCategory::Validation,
      ErrorCode::PropertyNotFound
      | ErrorCode::PropertyFormat
      | ErrorCode::PropertyUnavailable
      | ErrorCode::PropertyError => ErrorCategory::Property,
      _ => ErrorCategory::Engine,
    }
  }
}

impl From<ErrorCode> for i32 {
  fn from(code: ErrorCode) -> Self {
    code.as_raw()
  }
}
