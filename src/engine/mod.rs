//! The seam between the binding and a media engine.
//!
//! An [`Engine`] runs on the player's worker thread. It receives requests one
//! at a time, in submission order, and pushes events, frames and faults back
//! through the [`EngineContext`] it is handed at initialization.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::event::{Event, LogLevel};
use crate::player::{Command, EventSink, FrameSink, SubscriptionId, SurfaceInfo};
use crate::value::Value;

pub mod mpv;

#[cfg(test)]
pub(crate) mod testing;

/// A media engine driven by a player.
///
/// All methods are called from the worker thread, never concurrently.
pub trait Engine: Send + 'static {
  /// Bring the engine up and bind it to the host surface.
  fn initialize(
    &mut self,
    surface: SurfaceInfo,
    ctx: EngineContext,
  ) -> impl Future<Output = Result<()>> + Send;

  /// Run a command and return its result value.
  fn command(&mut self, command: &Command) -> impl Future<Output = Result<Value>> + Send;

  fn get_property(&mut self, name: &str) -> impl Future<Output = Result<Value>> + Send;

  fn set_property(&mut self, name: &str, value: &Value)
    -> impl Future<Output = Result<()>> + Send;

  /// Start reporting changes of `name` as `Event::PropertyChange` with `id`.
  fn observe_property(
    &mut self,
    id: SubscriptionId,
    name: &str,
  ) -> impl Future<Output = Result<()>> + Send;

  fn unobserve_property(&mut self, id: SubscriptionId) -> impl Future<Output = Result<()>> + Send;

  /// Release every engine resource. Called once, after the last request.
  fn shutdown(&mut self) -> impl Future<Output = ()> + Send;
}

/// Handles an engine uses to talk back to its player.
#[derive(Clone)]
pub struct EngineContext {
  events: EventSink,
  frames: FrameSink,
  log_level: LogLevel,
  lost: CancellationToken,
  fault: Arc<Mutex<Option<String>>>,
  wake: Arc<Notify>,
}

impl EngineContext {
  pub(crate) fn new(
    events: EventSink,
    frames: FrameSink,
    log_level: LogLevel,
    wake: Arc<Notify>,
  ) -> Self {
    Self {
      events,
      frames,
      log_level,
      lost: CancellationToken::new(),
      fault: Arc::new(Mutex::new(None)),
      wake,
    }
  }

  /// Queue an event for the host.
  pub fn emit(&self, event: Event) {
    self.events.emit(event);
  }

  /// Frame hand-off to the host surface.
  pub fn frames(&self) -> &FrameSink {
    &self.frames
  }

  /// Minimum log level the host asked for.
  pub fn log_level(&self) -> LogLevel {
    self.log_level
  }

  /// Report an unrecoverable engine failure.
  ///
  /// The player stops serving requests and the first reason is delivered
  /// once to the host's log callback.
  pub fn report_fault(&self, reason: impl Into<String>) {
    let reason = reason.into();
    {
      let mut fault = self.fault.lock();
      if fault.is_some() {
        return;
      }
      log::error!("Engine fault: {}", reason);
      *fault = Some(reason);
    }
    self.lost.cancel();
    self.wake.notify_one();
  }

  pub fn is_lost(&self) -> bool {
    self.lost.is_cancelled()
  }

  pub(crate) fn lost_token(&self) -> CancellationToken {
    self.lost.clone()
  }

  pub(crate) fn take_fault(&self) -> Option<String> {
    self.fault.lock().take()
  }
}
