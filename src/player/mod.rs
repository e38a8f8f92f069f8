//! The player handle: lifecycle, request admission and host-thread delivery.
//!
//! A [`Player`] lives on the host thread. Commands and property accesses are
//! queued to a worker thread running the engine and come back as
//! [`PendingReply`] futures. Events, property changes and frames produced by
//! the engine are buffered until the host calls [`Player::dispatch_events`]
//! and [`Player::present_frame`] on its next tick.

mod bridge;
mod callbacks;
mod dispatcher;
mod frame;
mod observe;
mod worker;

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Notify;

pub use bridge::EventSink;
pub use callbacks::PlayerOptions;
pub use dispatcher::{Command, PendingReply};
pub use frame::{Frame, FrameSink, FrameStats, FrameTarget, PixelFormat, Surface, SurfaceInfo};
pub use observe::{PropertyHandler, PropertyRegistry, SubscriptionId};

use bridge::EventBridge;
use callbacks::PlayerCallbacks;
use dispatcher::{Dispatcher, Request};
use frame::FramePipeline;
use observe::ObservationManager;
use worker::{StartError, StopOutcome, Worker};

use crate::command::CommandInterface;
use crate::config::PlayerConfig;
use crate::engine::{Engine, EngineContext};
use crate::error::{ErrorCode, Result};
use crate::event::{Event, LogLevel, LogMessage};
use crate::property::Property;
use crate::value::{FromValue, Value};

/// Prefix of log messages produced by the binding itself.
const BINDING_PREFIX: &str = "binding";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
  Created,
  Initialized,
  /// Terminal. Also entered after an engine fault.
  Disposed,
}

/// How `dispose()` went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisposeOutcome {
  /// The worker drained its queue and shut the engine down in time.
  Clean,
  /// The worker missed the drain deadline and was cancelled or detached.
  TimedOut,
  AlreadyDisposed,
}

/// Everything that only exists while the engine runs.
struct Session {
  dispatcher: Dispatcher,
  bridge: EventBridge,
  ctx: EngineContext,
  worker: Worker,
}

/// A media player bound to one host surface.
pub struct Player<E: Engine> {
  state: PlayerState,
  engine: Option<E>,
  config: PlayerConfig,
  callbacks: PlayerCallbacks,
  observers: ObservationManager,
  frames: FramePipeline,
  frame_sink: FrameSink,
  wake: Arc<Notify>,
  session: Option<Session>,
}

impl<E: Engine> Player<E> {
  pub fn new(surface: impl Surface + 'static, engine: E, options: PlayerOptions) -> Self {
    let wake = Arc::new(Notify::new());
    let (frame_sink, frames) = FramePipeline::new(Box::new(surface), wake.clone());
    Self {
      state: PlayerState::Created,
      engine: Some(engine),
      config: options.config,
      callbacks: options.callbacks,
      observers: ObservationManager::new(),
      frames,
      frame_sink,
      wake,
      session: None,
    }
  }

  pub fn state(&self) -> PlayerState {
    self.state
  }

  pub fn config(&self) -> &PlayerConfig {
    &self.config
  }

  /// Start the engine and bind it to the surface.
  ///
  /// A failed start leaves the player in `Created`, so `create()` may be
  /// retried, unless the engine timed out and could not be recovered.
  pub fn create(&mut self) -> Result<()> {
    match self.state {
      PlayerState::Initialized => return Ok(()),
      PlayerState::Disposed => return Err(ErrorCode::Uninitialized),
      PlayerState::Created => {}
    }

    if let Err(reason) = self.config.validate() {
      self.report(LogLevel::Error, format!("invalid configuration: {}", reason));
      return Err(ErrorCode::OptionError);
    }
    if !self.frames.surface_valid() {
      self.report(LogLevel::Error, "surface is not valid".to_string());
      return Err(ErrorCode::InvalidParameter);
    }
    let Some(engine) = self.engine.take() else {
      return Err(ErrorCode::Uninitialized);
    };
    let surface = self.frames.surface_info().unwrap_or_default();

    let (events, bridge) = EventBridge::new(self.config.event_queue_capacity, self.wake.clone());
    let ctx = EngineContext::new(
      events,
      self.frame_sink.clone(),
      self.config.log_level,
      self.wake.clone(),
    );
    let (dispatcher, requests) = Dispatcher::new(self.config.command_queue_capacity);

    log::info!(
      "Starting player engine ({}x{}, handle {:?})",
      surface.width,
      surface.height,
      surface.native_handle
    );
    match Worker::start(
      engine,
      surface,
      ctx.clone(),
      requests,
      self.config.startup_timeout(),
    ) {
      Ok(worker) => {
        self.session = Some(Session {
          dispatcher,
          bridge,
          ctx,
          worker,
        });
        self.state = PlayerState::Initialized;
        log::info!("Player initialized");
        Ok(())
      }
      Err(StartError { code, engine }) => {
        self.report(LogLevel::Error, format!("engine failed to start: {}", code));
        match engine {
          Some(engine) => self.engine = Some(engine),
          None => self.teardown(),
        }
        Err(code)
      }
    }
  }

  /// Stop the engine and release the surface. Idempotent.
  pub fn dispose(&mut self) -> DisposeOutcome {
    if self.state == PlayerState::Disposed {
      return DisposeOutcome::AlreadyDisposed;
    }

    let outcome = match self.session.take() {
      Some(session) => {
        session.dispatcher.close();
        let stopped = session.worker.stop(self.config.dispose_timeout());
        session.bridge.close();
        match stopped {
          StopOutcome::Drained => DisposeOutcome::Clean,
          StopOutcome::Cancelled | StopOutcome::Detached => {
            log::warn!(
              "Engine did not drain within {} ms ({:?})",
              self.config.dispose_timeout_ms,
              stopped
            );
            DisposeOutcome::TimedOut
          }
        }
      }
      None => DisposeOutcome::Clean,
    };

    self.teardown();
    log::info!("Player disposed");
    outcome
  }

  fn teardown(&mut self) {
    self.observers.clear();
    self.callbacks = PlayerCallbacks::default();
    self.frames.release();
    self.engine = None;
    self.session = None;
    self.state = PlayerState::Disposed;
  }

  /// Deliver a message from the binding itself to `on_log`.
  fn report(&mut self, level: LogLevel, text: String) {
    self
      .callbacks
      .log(&LogMessage::new(BINDING_PREFIX, level, text));
  }

  fn session(&self) -> Result<&Session> {
    match (self.state, &self.session) {
      (PlayerState::Initialized, Some(session)) => Ok(session),
      _ => Err(ErrorCode::Uninitialized),
    }
  }

  fn submit(&self, request: Request) -> Result<PendingReply> {
    self.session()?.dispatcher.submit(request)
  }

  /// Queue a command. Fails with `QueueFull` instead of waiting.
  pub fn execute(&self, command: Command) -> Result<PendingReply> {
    self.submit(Request::Command(command))
  }

  /// Shorthand for `execute(Command::new(name).args(args))`.
  pub fn command<I, V>(&self, name: &str, args: I) -> Result<PendingReply>
  where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
  {
    self.execute(Command::new(name).args(args))
  }

  /// Typed per-command interface.
  pub fn commands(&self) -> CommandInterface<'_, E> {
    CommandInterface::new(self)
  }

  /// Number of commands waiting for the engine.
  pub fn queued_commands(&self) -> usize {
    self.session().map(|s| s.dispatcher.queued()).unwrap_or(0)
  }

  pub fn get_property(&self, name: &str) -> Result<PendingReply> {
    self.submit(Request::GetProperty(name.to_string()))
  }

  pub fn set_property(&self, name: &str, value: impl Into<Value>) -> Result<PendingReply> {
    self.submit(Request::SetProperty(name.to_string(), value.into()))
  }

  /// Read a property through the typed table.
  pub fn get<T: FromValue>(
    &self,
    property: Property<T>,
  ) -> Result<impl Future<Output = Result<T>>> {
    let reply = self.get_property(property.name())?;
    Ok(async move {
      let value = reply.await?;
      let format = value.format_name();
      T::from_value(value).map_err(|code| {
        log::debug!("{} arrived as {}: {}", property.name(), format, code);
        code
      })
    })
  }

  /// Write a property through the typed table.
  pub fn set<T: Into<Value>>(&self, property: Property<T>, value: T) -> Result<PendingReply> {
    self.set_property(property.name(), value)
  }

  /// Call `handler` on the host thread whenever `name` changes.
  ///
  /// The handler sees at least the latest value; intermediate values may be
  /// skipped when the host drains less often than the property changes.
  pub fn observe_property(
    &mut self,
    name: &str,
    handler: impl FnMut(&str, &Value) + 'static,
  ) -> Result<SubscriptionId> {
    self.session()?;
    if name.trim().is_empty() {
      return Err(ErrorCode::InvalidParameter);
    }
    let id = self.observers.next_id();
    self
      .session()?
      .dispatcher
      .notify(Request::Observe(id, name.to_string()))?;
    self.observers.register(id, name, Box::new(handler));
    log::debug!("Observing {} as subscription {}", name, id);
    Ok(id)
  }

  /// Remove a subscription. No handler call for `id` happens afterwards.
  pub fn unobserve_property(&mut self, id: SubscriptionId) -> Result<()> {
    let session = self.session()?;
    if !self.observers.contains(id) {
      return Err(ErrorCode::InvalidParameter);
    }
    session.bridge.forget(id);
    if let Err(code) = session.dispatcher.notify(Request::Unobserve(id)) {
      // the host side is already detached, the engine keeps reporting into the void
      log::warn!("Could not queue unobserve of subscription {}: {}", id, code);
    }
    self.observers.unregister(id);
    Ok(())
  }

  /// Last value delivered to observers of `name`.
  pub fn observed_value(&self, name: &str) -> Option<&Value> {
    self.observers.registry().get(name)
  }

  pub fn observed_values(&self) -> &PropertyRegistry {
    self.observers.registry()
  }

  /// Live subscriptions on `name`, oldest first.
  pub fn subscriptions(&self, name: &str) -> Vec<SubscriptionId> {
    self.observers.subscriptions_for(name)
  }

  /// Run callbacks for everything the engine produced since the last call.
  ///
  /// Returns the number of events delivered.
  pub fn dispatch_events(&mut self) -> usize {
    if self.state != PlayerState::Initialized {
      return 0;
    }
    let Some(session) = self.session.as_ref() else {
      return 0;
    };

    let callbacks = &mut self.callbacks;
    let observers = &mut self.observers;
    let delivered = session.bridge.drain(|event| match event {
      Event::PropertyChange { id, name, value } => {
        observers.deliver(id, &name, &value);
      }
      other => callbacks.dispatch(&other),
    });

    let fault = session.ctx.take_fault();
    match fault {
      Some(reason) => {
        self.fail(reason);
        delivered + 1
      }
      None => delivered,
    }
  }

  fn fail(&mut self, reason: String) {
    log::error!("Player failed: {}", reason);
    self
      .callbacks
      .log(&LogMessage::new(BINDING_PREFIX, LogLevel::Fatal, reason));
    self.dispose();
  }

  /// Present the latest frame, if one is waiting.
  pub fn present_frame(&mut self) -> bool {
    self.state == PlayerState::Initialized && self.frames.present()
  }

  /// Resize the surface. Frames rendered for the old size are discarded.
  pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
    if self.state != PlayerState::Initialized || !self.frames.resize(width, height) {
      return Err(ErrorCode::Uninitialized);
    }
    Ok(())
  }

  pub fn needs_redraw(&self) -> bool {
    self.state == PlayerState::Initialized && self.frames.needs_redraw()
  }

  pub fn frame_stats(&self) -> FrameStats {
    self.frames.stats()
  }

  /// Notified whenever events, frames or a fault are waiting for the host.
  pub fn wakeup_handle(&self) -> Option<Arc<Notify>> {
    (self.state != PlayerState::Disposed).then(|| self.wake.clone())
  }
}

impl<E: Engine> Drop for Player<E> {
  fn drop(&mut self) {
    self.dispose();
  }
}

#[cfg(test)]
pub(crate) mod tests_support {
  use std::sync::Arc;

  use tokio::sync::Notify;

  use super::bridge::EventBridge;
  use super::frame::FramePipeline;
  pub(crate) use super::frame::tests::MemorySurface;
  use crate::engine::EngineContext;
  use crate::event::{Event, LogLevel};

  pub(crate) fn surface() -> MemorySurface {
    MemorySurface::new(320, 240)
  }

  /// An engine context without a player around it.
  pub(crate) struct TestContext {
    pub ctx: EngineContext,
    bridge: EventBridge,
    _frames: FramePipeline,
  }

  impl TestContext {
    pub(crate) fn new() -> Self {
      let wake = Arc::new(Notify::new());
      let (events, bridge) = EventBridge::new(64, wake.clone());
      let (frame_sink, frames) = FramePipeline::new(Box::new(surface()), wake.clone());
      Self {
        ctx: EngineContext::new(events, frame_sink, LogLevel::Info, wake),
        bridge,
        _frames: frames,
      }
    }

    /// Everything emitted so far, in order.
    pub(crate) fn events(&self) -> Vec<Event> {
      let mut events = Vec::new();
      self.bridge.drain(|event| events.push(event));
      events
    }
  }
}
