//! Scriptable mpv player binding for a single-threaded host.
//!
//! ```no_run
//! use mpv_player::{MpvConfig, MpvIpcEngine, Player, PlayerOptions, SurfaceInfo, props};
//! # struct Window;
//! # impl mpv_player::Surface for Window {
//! #   fn info(&self) -> SurfaceInfo { SurfaceInfo::default() }
//! #   fn resize(&mut self, _: u32, _: u32) {}
//! #   fn present(&mut self, _: &mpv_player::Frame) {}
//! # }
//! # async fn demo() -> mpv_player::Result<()> {
//! let engine = MpvIpcEngine::new(MpvConfig::default());
//! let mut player = Player::new(Window, engine, PlayerOptions::new().on_idle(|| println!("idle")));
//! player.create()?;
//! player.commands().loadfile("movie.mkv")?.await?;
//! let paused = player.get(props::PAUSE)?.await?;
//! player.dispatch_events();
//! # let _ = paused;
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod player;
pub mod property;
pub mod value;

pub use command::CommandInterface;
pub use config::{MpvConfig, PlayerConfig};
pub use engine::mpv::MpvIpcEngine;
pub use engine::{Engine, EngineContext};
pub use error::{ErrorCategory, ErrorCode, Result};
pub use event::{EndFileReason, Event, LogLevel, LogMessage};
pub use player::{
  Command, DisposeOutcome, EventSink, Frame, FrameSink, FrameStats, FrameTarget, PendingReply,
  PixelFormat, Player, PlayerOptions, PlayerState, PropertyRegistry, SubscriptionId, Surface,
  SurfaceInfo,
};
pub use property::{props, Access, Property};
pub use value::{FromValue, Value};
