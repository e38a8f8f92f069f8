//! In-memory engine used by the player tests.
//!
//! Behaves like a tiny mpv: properties live in a map, observed properties are
//! reported on change, `loadfile` fails for paths that do not exist. A few
//! extra commands let tests control timing:
//!
//! - `block`: parks the worker until [`Script::gate`] is notified
//! - `crash`: reports a fault
//! - `panic`: panics on the worker thread
//! - `frame <pts>`: renders one frame for the current surface

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::{Engine, EngineContext};
use crate::error::{ErrorCode, Result};
use crate::event::{EndFileReason, Event};
use crate::player::{Command, Frame, PixelFormat, SubscriptionId, SurfaceInfo};
use crate::property::{self, Access};
use crate::value::Value;

/// Test-side view of a scripted engine.
#[derive(Clone, Default)]
pub(crate) struct Script {
  pub commands: Arc<Mutex<Vec<Command>>>,
  pub entered: Arc<AtomicUsize>,
  pub gate: Arc<Notify>,
  pub fail_init: Arc<Mutex<Option<ErrorCode>>>,
  pub init_delay: Arc<Mutex<Option<std::time::Duration>>>,
  pub surface: Arc<Mutex<Option<SurfaceInfo>>>,
  pub shut_down: Arc<AtomicBool>,
}

impl Script {
  pub(crate) fn command_names(&self) -> Vec<String> {
    self
      .commands
      .lock()
      .iter()
      .map(|c| c.name().to_string())
      .collect()
  }

  /// Spin until the engine has been shut down.
  pub(crate) fn wait_shut_down(&self) {
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while !self.shut_down.load(Ordering::Acquire) {
      assert!(std::time::Instant::now() < deadline, "engine never shut down");
      std::thread::sleep(std::time::Duration::from_millis(2));
    }
  }

  /// Spin until `n` blocking commands have started.
  pub(crate) fn wait_entered(&self, n: usize) {
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while self.entered.load(Ordering::Acquire) < n {
      assert!(std::time::Instant::now() < deadline, "blocking command never started");
      std::thread::sleep(std::time::Duration::from_millis(2));
    }
  }
}

pub(crate) struct ScriptedEngine {
  script: Script,
  ctx: Option<EngineContext>,
  properties: HashMap<String, Value>,
  observers: HashMap<SubscriptionId, String>,
  next_entry: i64,
}

impl ScriptedEngine {
  pub(crate) fn new() -> (Self, Script) {
    let script = Script::default();
    let properties = [
      ("pause", Value::Flag(false)),
      ("volume", Value::Double(100.0)),
      ("mute", Value::Flag(false)),
      ("speed", Value::Double(1.0)),
      ("time-pos", Value::None),
      ("duration", Value::None),
      ("idle-active", Value::Flag(true)),
      ("mpv-version", Value::from("mpv scripted")),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value))
    .collect();

    let engine = Self {
      script: script.clone(),
      ctx: None,
      properties,
      observers: HashMap::new(),
      next_entry: 0,
    };
    (engine, script)
  }

  fn ctx(&self) -> Result<&EngineContext> {
    self.ctx.as_ref().ok_or(ErrorCode::Uninitialized)
  }

  fn store(&mut self, name: &str, value: Value) -> Result<()> {
    self.properties.insert(name.to_string(), value.clone());
    let ctx = self.ctx()?;
    for (id, observed) in &self.observers {
      if observed == name {
        ctx.emit(Event::PropertyChange {
          id: *id,
          name: name.to_string(),
          value: value.clone(),
        });
      }
    }
    Ok(())
  }

  fn load(&mut self, path: &str) -> Result<Value> {
    self.ctx()?.emit(Event::FileStart);
    if Path::new(path).exists() {
      self.store("path", Value::from(path))?;
      self.store("idle-active", Value::Flag(false))?;
      self.ctx()?.emit(Event::FileLoaded);
    } else {
      let ctx = self.ctx()?;
      ctx.emit(Event::FileEnd {
        reason: EndFileReason::Error,
        error: ErrorCode::LoadingFailed,
      });
      ctx.emit(Event::Idle);
    }
    self.next_entry += 1;
    let mut reply = BTreeMap::new();
    reply.insert("playlist_entry_id".to_string(), Value::Int64(self.next_entry));
    Ok(Value::Map(reply))
  }
}

impl Engine for ScriptedEngine {
  async fn initialize(&mut self, surface: SurfaceInfo, ctx: EngineContext) -> Result<()> {
    *self.script.surface.lock() = Some(surface);
    let delay = *self.script.init_delay.lock();
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }
    let failure = *self.script.fail_init.lock();
    if let Some(code) = failure {
      return Err(code);
    }
    self.ctx = Some(ctx);
    Ok(())
  }

  async fn command(&mut self, command: &Command) -> Result<Value> {
    self.script.commands.lock().push(command.clone());
    let args = command.positional();

    match command.name() {
      "loadfile" => {
        let path = args
          .first()
          .or_else(|| command.options().get("url"))
          .and_then(Value::as_str)
          .ok_or(ErrorCode::InvalidParameter)?
          .to_string();
        self.load(&path)
      }
      "seek" => {
        let target = args
          .first()
          .and_then(Value::as_f64)
          .ok_or(ErrorCode::InvalidParameter)?;
        self.ctx()?.emit(Event::Seek);
        self.store("time-pos", Value::Double(target))?;
        self.ctx()?.emit(Event::PlaybackRestart);
        Ok(Value::None)
      }
      "stop" => {
        let ctx = self.ctx()?;
        ctx.emit(Event::FileEnd {
          reason: EndFileReason::Stop,
          error: ErrorCode::Success,
        });
        ctx.emit(Event::Idle);
        Ok(Value::None)
      }
      "block" => {
        self.script.entered.fetch_add(1, Ordering::AcqRel);
        self.script.gate.notified().await;
        Ok(Value::None)
      }
      "crash" => {
        self.ctx()?.report_fault("scripted engine crashed");
        Ok(Value::None)
      }
      "panic" => panic!("scripted engine panicked"),
      "frame" => {
        let pts = args.first().and_then(Value::as_f64).unwrap_or(0.0);
        let frames = self.ctx()?.frames();
        let target = frames.target();
        let stride = target.width * PixelFormat::Rgba.bytes_per_pixel();
        frames.submit(Frame {
          width: target.width,
          height: target.height,
          format: PixelFormat::Rgba,
          stride,
          pixels: vec![0; (stride * target.height) as usize],
          pts,
          generation: target.generation,
        });
        Ok(Value::None)
      }
      _ => Ok(Value::None),
    }
  }

  async fn get_property(&mut self, name: &str) -> Result<Value> {
    match self.properties.get(name) {
      None => Err(ErrorCode::PropertyNotFound),
      Some(Value::None) => Err(ErrorCode::PropertyUnavailable),
      Some(value) => Ok(value.clone()),
    }
  }

  async fn set_property(&mut self, name: &str, value: &Value) -> Result<()> {
    if property::lookup(name) == Some(Access::ReadOnly) {
      return Err(ErrorCode::PropertyError);
    }
    self.store(name, value.clone())
  }

  async fn observe_property(&mut self, id: SubscriptionId, name: &str) -> Result<()> {
    if !self.properties.contains_key(name) && property::lookup(name).is_none() {
      return Err(ErrorCode::PropertyNotFound);
    }
    self.observers.insert(id, name.to_string());
    let current = self.properties.get(name).cloned().unwrap_or_default();
    self.ctx()?.emit(Event::PropertyChange {
      id,
      name: name.to_string(),
      value: current,
    });
    Ok(())
  }

  async fn unobserve_property(&mut self, id: SubscriptionId) -> Result<()> {
    self.observers.remove(&id);
    Ok(())
  }

  async fn shutdown(&mut self) {
    self.observers.clear();
    self.ctx = None;
    self.script.shut_down.store(true, Ordering::Release);
  }
}
