//! mpv JSON IPC protocol types.
//!
//! Reference: https://mpv.io/manual/master/#json-ipc

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, Result};
use crate::event::{EndFileReason, Event, LogLevel, LogMessage};
use crate::player::{Command, SubscriptionId};
use crate::value::Value;

/// Command payload sent to mpv, without its request id.
#[derive(Debug, Clone, PartialEq)]
pub struct MpvCommand {
  command: serde_json::Value,
}

#[derive(Serialize)]
struct Request<'a> {
  command: &'a serde_json::Value,
  request_id: i64,
}

impl MpvCommand {
  pub fn new(args: Vec<serde_json::Value>) -> Self {
    Self {
      command: serde_json::Value::Array(args),
    }
  }

  /// Encode a player command.
  ///
  /// Without options it becomes `[name, args...]`; with options the named
  /// form `{"name": name, ...options}`. mpv cannot mix the two.
  pub fn from_command(command: &Command) -> Result<Self> {
    if command.options().is_empty() {
      let mut args = Vec::with_capacity(command.positional().len() + 1);
      args.push(command.name().into());
      args.extend(command.positional().iter().cloned().map(serde_json::Value::from));
      return Ok(Self::new(args));
    }
    if !command.positional().is_empty() {
      return Err(ErrorCode::InvalidParameter);
    }
    let mut named = serde_json::Map::new();
    named.insert("name".to_string(), command.name().into());
    for (key, value) in command.options() {
      if key == "name" {
        return Err(ErrorCode::InvalidParameter);
      }
      named.insert(key.clone(), value.clone().into());
    }
    Ok(Self {
      command: serde_json::Value::Object(named),
    })
  }

  pub fn get_property(name: &str) -> Self {
    Self::new(vec!["get_property".into(), name.into()])
  }

  pub fn set_property(name: &str, value: &Value) -> Self {
    Self::new(vec!["set_property".into(), name.into(), value.clone().into()])
  }

  pub fn observe_property(id: SubscriptionId, name: &str) -> Self {
    Self::new(vec!["observe_property".into(), id.get().into(), name.into()])
  }

  pub fn unobserve_property(id: SubscriptionId) -> Self {
    Self::new(vec!["unobserve_property".into(), id.get().into()])
  }

  /// Ask mpv to send `log-message` events at `level` and above.
  pub fn request_log_messages(level: LogLevel) -> Self {
    Self::new(vec!["request_log_messages".into(), level.as_str().into()])
  }

  pub fn quit() -> Self {
    Self::new(vec!["quit".into()])
  }

  /// Serialize as one IPC line (without the trailing newline).
  pub fn to_line(&self, request_id: i64) -> std::result::Result<String, serde_json::Error> {
    serde_json::to_string(&Request {
      command: &self.command,
      request_id,
    })
  }
}

/// Response from mpv for a command.
#[derive(Debug, Clone, Deserialize)]
pub struct MpvResponse {
  /// "success" or error message.
  pub error: String,
  /// Response data (command-specific).
  #[serde(default)]
  pub data: Option<serde_json::Value>,
  /// Matching request ID.
  pub request_id: i64,
}

impl MpvResponse {
  pub fn is_success(&self) -> bool {
    self.error == "success"
  }

  /// Response data, or the error code mpv reported.
  pub fn into_result(self) -> Result<Value> {
    if !self.is_success() {
      return Err(ErrorCode::from_message(&self.error));
    }
    Ok(self.data.map(Value::from).unwrap_or_default())
  }
}

/// Event sent by mpv.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MpvEvent {
  /// Event type (e.g. "property-change", "end-file", "log-message").
  pub event: String,
  /// Observer id for property-change events.
  pub id: Option<i64>,
  /// Property name for property-change events.
  pub name: Option<String>,
  /// Property value for property-change events.
  pub data: Option<serde_json::Value>,
  /// Reason for end-file events (e.g. "eof", "stop", "quit", "error").
  pub reason: Option<String>,
  /// Error message for end-file events with reason "error".
  pub file_error: Option<String>,
  /// Subsystem of log-message events.
  pub prefix: Option<String>,
  /// Level name of log-message events.
  pub level: Option<String>,
  /// Text of log-message events.
  pub text: Option<String>,
}

impl MpvEvent {
  /// Translate into a player event. Events the player has no use for
  /// yield `None`.
  pub fn into_event(self) -> Option<Event> {
    let event = match self.event.as_str() {
      "start-file" => Event::FileStart,
      "file-loaded" => Event::FileLoaded,
      "end-file" => {
        let reason = self
          .reason
          .as_deref()
          .and_then(EndFileReason::from_name)
          .unwrap_or(EndFileReason::Error);
        let error = match reason {
          EndFileReason::Error => self
            .file_error
            .as_deref()
            .map(ErrorCode::from_message)
            .unwrap_or(ErrorCode::Generic),
          _ => ErrorCode::Success,
        };
        Event::FileEnd { reason, error }
      }
      "idle" => Event::Idle,
      "video-reconfig" => Event::VideoReconfig,
      "audio-reconfig" => Event::AudioReconfig,
      "seek" => Event::Seek,
      "playback-restart" => Event::PlaybackRestart,
      "log-message" => {
        let level = self
          .level
          .as_deref()
          .and_then(|l| l.parse().ok())
          .unwrap_or(LogLevel::Info);
        let text = self.text.unwrap_or_default();
        Event::LogMessage(LogMessage::new(
          self.prefix.unwrap_or_default(),
          level,
          text.trim_end_matches('\n'),
        ))
      }
      "property-change" => {
        let id = u64::try_from(self.id?).ok().filter(|id| *id > 0)?;
        Event::PropertyChange {
          id: SubscriptionId::new(id),
          name: self.name.unwrap_or_default(),
          value: self.data.map(Value::from).unwrap_or_default(),
        }
      }
      _ => return None,
    };
    Some(event)
  }
}

/// Message received from mpv IPC (either response or event).
#[derive(Debug, Clone)]
pub enum MpvMessage {
  Response(MpvResponse),
  Event(MpvEvent),
}

impl MpvMessage {
  /// Parse a JSON line from mpv.
  pub fn parse(line: &str) -> std::result::Result<Self, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(line)?;
    // events never carry a request_id at the top level
    if value.get("event").is_some() {
      Ok(MpvMessage::Event(serde_json::from_value(value)?))
    } else {
      Ok(MpvMessage::Response(serde_json::from_value(value)?))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_command_serialization() {
    let cmd = MpvCommand::from_command(&Command::new("loadfile").arg("http://example.com/video.mp4"))
      .unwrap();
    assert_eq!(
      cmd.to_line(7).unwrap(),
      r#"{"command":["loadfile","http://example.com/video.mp4"],"request_id":7}"#
    );
  }

  #[test]
  fn test_named_command_serialization() {
    let cmd = Command::new("loadfile")
      .option("url", "a.mkv")
      .option("flags", "append");
    let line = MpvCommand::from_command(&cmd).unwrap().to_line(1).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(parsed["command"]["name"], "loadfile");
    assert_eq!(parsed["command"]["url"], "a.mkv");
    assert_eq!(parsed["command"]["flags"], "append");
  }

  #[test]
  fn test_mixed_command_rejected() {
    let cmd = Command::new("loadfile").arg("a.mkv").option("flags", "append");
    assert_eq!(
      MpvCommand::from_command(&cmd).err(),
      Some(ErrorCode::InvalidParameter)
    );
  }

  #[test]
  fn test_response_parsing() {
    let json = r#"{"error":"success","data":null,"request_id":1}"#;
    match MpvMessage::parse(json).unwrap() {
      MpvMessage::Response(r) => {
        assert!(r.is_success());
        assert_eq!(r.request_id, 1);
        assert_eq!(r.into_result(), Ok(Value::None));
      }
      _ => panic!("Expected response"),
    }

    let json = r#"{"error":"property unavailable","request_id":2}"#;
    match MpvMessage::parse(json).unwrap() {
      MpvMessage::Response(r) => {
        assert_eq!(r.into_result(), Err(ErrorCode::PropertyUnavailable));
      }
      _ => panic!("Expected response"),
    }
  }

  #[test]
  fn test_event_parsing() {
    let json = r#"{"event":"property-change","id":1,"name":"pause","data":false}"#;
    match MpvMessage::parse(json).unwrap() {
      MpvMessage::Event(e) => {
        assert_eq!(e.event, "property-change");
        assert_eq!(
          e.into_event(),
          Some(Event::PropertyChange {
            id: SubscriptionId::new(1),
            name: "pause".to_string(),
            value: Value::Flag(false),
          })
        );
      }
      _ => panic!("Expected event"),
    }
  }

  #[test]
  fn test_event_with_request_id_text_in_data() {
    let json = r#"{"event":"log-message","prefix":"cplayer","level":"v","text":"request_id=3\n"}"#;
    let MpvMessage::Event(e) = MpvMessage::parse(json).unwrap() else {
      panic!("Expected event");
    };
    assert_eq!(
      e.into_event(),
      Some(Event::LogMessage(LogMessage::new(
        "cplayer",
        LogLevel::Verbose,
        "request_id=3"
      )))
    );
  }

  #[test]
  fn test_end_file_translation() {
    let json = r#"{"event":"end-file","reason":"error","file_error":"loading failed"}"#;
    let MpvMessage::Event(e) = MpvMessage::parse(json).unwrap() else {
      panic!("Expected event");
    };
    assert_eq!(
      e.into_event(),
      Some(Event::FileEnd {
        reason: EndFileReason::Error,
        error: ErrorCode::LoadingFailed,
      })
    );

    let e = MpvEvent {
      event: "end-file".to_string(),
      reason: Some("eof".to_string()),
      ..MpvEvent::default()
    };
    assert_eq!(
      e.into_event(),
      Some(Event::FileEnd {
        reason: EndFileReason::Eof,
        error: ErrorCode::Success,
      })
    );
  }

  #[test]
  fn test_unknown_events_ignored() {
    let e = MpvEvent {
      event: "client-message".to_string(),
      ..MpvEvent::default()
    };
    assert_eq!(e.into_event(), None);

    // observers registered by someone else use id 0
    let e = MpvEvent {
      event: "property-change".to_string(),
      id: Some(0),
      name: Some("pause".to_string()),
      ..MpvEvent::default()
    };
    assert_eq!(e.into_event(), None);
  }
}
