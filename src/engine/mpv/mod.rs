//! mpv backend: spawns an external mpv per player and drives it over JSON IPC.
//!
//! Architecture:
//! - `process.rs` - mpv binary detection and process spawning
//! - `ipc.rs` - Async IPC connection (Named Pipes on Windows, Unix Sockets on Linux/macOS)
//! - `protocol.rs` - JSON command/response/event types and translation
//!
//! mpv draws into the host window itself (`--wid`), so this backend never
//! submits frames through the player's frame pipeline.

mod ipc;
mod process;
mod protocol;

use std::process::Child;

pub use ipc::IpcError;
pub use process::{find_mpv, ProcessError};
pub use protocol::{MpvCommand, MpvEvent, MpvResponse};

use ipc::{IpcHandlers, MpvIpc};

use super::{Engine, EngineContext};
use crate::config::MpvConfig;
use crate::error::{ErrorCode, Result};
use crate::event::LogLevel;
use crate::player::{Command, SubscriptionId, SurfaceInfo};
use crate::value::Value;

/// [`Engine`] backed by an external mpv process.
pub struct MpvIpcEngine {
  config: MpvConfig,
  process: Option<Child>,
  socket: Option<String>,
  ipc: Option<MpvIpc>,
}

impl MpvIpcEngine {
  pub fn new(config: MpvConfig) -> Self {
    Self {
      config,
      process: None,
      socket: None,
      ipc: None,
    }
  }

  fn handlers(ctx: &EngineContext) -> IpcHandlers {
    let events = ctx.clone();
    let lost = ctx.clone();
    IpcHandlers {
      on_event: Box::new(move |event| {
        if let Some(event) = event.into_event() {
          events.emit(event);
        }
      }),
      on_lost: Box::new(move |reason| lost.report_fault(reason)),
    }
  }

  /// Drive an already-connected stream instead of spawning mpv.
  pub(crate) fn attach<R, W>(&mut self, reader: R, writer: W, ctx: &EngineContext)
  where
    R: tokio::io::AsyncRead + Send + Unpin + 'static,
    W: tokio::io::AsyncWrite + Send + Unpin + 'static,
  {
    self.ipc = Some(MpvIpc::setup(
      reader,
      writer,
      self.config.ipc_timeout(),
      Self::handlers(ctx),
    ));
  }

  async fn request(&self, cmd: MpvCommand) -> Result<Value> {
    let ipc = self.ipc.as_ref().ok_or(ErrorCode::Uninitialized)?;
    let response = ipc.send_command(&cmd).await.map_err(|e| {
      log::warn!("mpv request failed: {}", e);
      ErrorCode::from(e)
    })?;
    response.into_result()
  }

  async fn start_logging(&self, level: LogLevel) -> Result<()> {
    if level == LogLevel::None {
      return Ok(());
    }
    self
      .request(MpvCommand::request_log_messages(level))
      .await
      .map(|_| ())
  }

  /// Kill the process and remove the socket.
  async fn reap(&mut self) {
    if let Some(ipc) = self.ipc.take() {
      ipc.close();
    }

    if let Some(mut child) = self.process.take() {
      let pid = child.id();
      log::info!("Stopping mpv process (pid: {})", pid);
      let result = tokio::task::spawn_blocking(move || {
        // quit may already have ended it
        if let Ok(Some(status)) = child.try_wait() {
          return Ok(status);
        }
        let _ = child.kill();
        child.wait()
      })
      .await;

      match result {
        Ok(Ok(status)) => log::info!("mpv process exited with: {}", status),
        Ok(Err(e)) => log::error!("wait() failed: {}", e),
        Err(e) => log::error!("spawn_blocking panicked during process cleanup: {}", e),
      }
    }

    if let Some(socket) = self.socket.take() {
      process::cleanup_ipc(&socket);
    }
  }
}

impl Engine for MpvIpcEngine {
  async fn initialize(&mut self, surface: SurfaceInfo, ctx: EngineContext) -> Result<()> {
    if let Err(reason) = self.config.validate() {
      log::error!("Invalid mpv configuration: {}", reason);
      return Err(ErrorCode::OptionError);
    }

    let socket = process::ipc_path(&self.config.socket_dir());
    process::cleanup_ipc(&socket);
    let child = process::spawn_mpv(&self.config, &surface, &socket).map_err(|e| {
      log::error!("{}", e);
      ErrorCode::from(e)
    })?;
    self.process = Some(child);
    self.socket = Some(socket.clone());

    let connected = MpvIpc::connect(
      &socket,
      self.config.connect_retries,
      self.config.ipc_timeout(),
      Self::handlers(&ctx),
    )
    .await;
    match connected {
      Ok(ipc) => self.ipc = Some(ipc),
      Err(e) => {
        log::error!("Could not connect to mpv: {}", e);
        self.reap().await;
        return Err(ErrorCode::Generic);
      }
    }

    if let Err(code) = self.start_logging(ctx.log_level()).await {
      self.reap().await;
      return Err(code);
    }

    log::info!("mpv client connected");
    Ok(())
  }

  async fn command(&mut self, command: &Command) -> Result<Value> {
    let cmd = MpvCommand::from_command(command)?;
    self.request(cmd).await
  }

  async fn get_property(&mut self, name: &str) -> Result<Value> {
    self.request(MpvCommand::get_property(name)).await
  }

  async fn set_property(&mut self, name: &str, value: &Value) -> Result<()> {
    self
      .request(MpvCommand::set_property(name, value))
      .await
      .map(|_| ())
  }

  async fn observe_property(&mut self, id: SubscriptionId, name: &str) -> Result<()> {
    self
      .request(MpvCommand::observe_property(id, name))
      .await
      .map(|_| ())
  }

  async fn unobserve_property(&mut self, id: SubscriptionId) -> Result<()> {
    self
      .request(MpvCommand::unobserve_property(id))
      .await
      .map(|_| ())
  }

  async fn shutdown(&mut self) {
    if self.ipc.is_some() {
      // mpv closes the connection before it answers quit
      let _ = self.request(MpvCommand::quit()).await;
    }
    self.reap().await;
    log::info!("mpv client stopped");
  }
}
