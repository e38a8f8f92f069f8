//! Typed wrappers over the engine's command vocabulary.
//!
//! Every method builds a [`Command`] and queues it through
//! [`Player::execute`]; nothing here talks to the engine directly.
//! Reference: https://mpv.io/manual/master/#list-of-input-commands

use std::collections::BTreeMap;

use crate::engine::Engine;
use crate::error::Result;
use crate::player::{Command, PendingReply, Player};
use crate::value::Value;

/// How the target of a seek is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekMode {
  /// Seconds from the current position.
  #[default]
  Relative,
  /// Seconds from the start of the file.
  Absolute,
  RelativePercent,
  AbsolutePercent,
}

impl SeekMode {
  pub fn as_str(self) -> &'static str {
    match self {
      SeekMode::Relative => "relative",
      SeekMode::Absolute => "absolute",
      SeekMode::RelativePercent => "relative-percent",
      SeekMode::AbsolutePercent => "absolute-percent",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekPrecision {
  /// Whatever the engine is configured to do.
  #[default]
  Default,
  Keyframes,
  Exact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScreenshotMode {
  /// Video with subtitles and OSD-free.
  #[default]
  Subtitles,
  Video,
  Window,
}

impl ScreenshotMode {
  pub fn as_str(self) -> &'static str {
    match self {
      ScreenshotMode::Subtitles => "subtitles",
      ScreenshotMode::Video => "video",
      ScreenshotMode::Window => "window",
    }
  }
}

/// Where `loadfile`/`loadlist` put the new entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadFileMode {
  /// Stop playback and replace the playlist.
  #[default]
  Replace,
  Append,
  /// Append, and start playing if nothing is playing.
  AppendPlay,
  InsertNext,
  InsertNextPlay,
}

impl LoadFileMode {
  pub fn as_str(self) -> &'static str {
    match self {
      LoadFileMode::Replace => "replace",
      LoadFileMode::Append => "append",
      LoadFileMode::AppendPlay => "append-play",
      LoadFileMode::InsertNext => "insert-next",
      LoadFileMode::InsertNextPlay => "insert-next-play",
    }
  }
}

/// Selection behavior of `sub-add` / `audio-add`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackFlag {
  #[default]
  Select,
  Auto,
  Cached,
}

impl TrackFlag {
  pub fn as_str(self) -> &'static str {
    match self {
      TrackFlag::Select => "select",
      TrackFlag::Auto => "auto",
      TrackFlag::Cached => "cached",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleDirection {
  #[default]
  Up,
  Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaylistStep {
  /// Do nothing at the end of the playlist.
  #[default]
  Weak,
  /// Stop playback at the end of the playlist.
  Force,
}

/// One method per engine command. Obtained from [`Player::commands`].
pub struct CommandInterface<'a, E: Engine> {
  player: &'a Player<E>,
}

impl<'a, E: Engine> CommandInterface<'a, E> {
  pub(crate) fn new(player: &'a Player<E>) -> Self {
    Self { player }
  }

  fn run(&self, command: Command) -> Result<PendingReply> {
    self.player.execute(command)
  }

  pub fn seek(&self, target: f64, mode: SeekMode) -> Result<PendingReply> {
    self.seek_with(target, mode, SeekPrecision::Default)
  }

  pub fn seek_with(
    &self,
    target: f64,
    mode: SeekMode,
    precision: SeekPrecision,
  ) -> Result<PendingReply> {
    let flags = match precision {
      SeekPrecision::Default => mode.as_str().to_string(),
      SeekPrecision::Keyframes => format!("{}+keyframes", mode.as_str()),
      SeekPrecision::Exact => format!("{}+exact", mode.as_str()),
    };
    self.run(Command::new("seek").arg(target).arg(flags))
  }

  /// Undo the last seek, or with `mark`, remember the current position
  /// as the one to return to.
  pub fn revert_seek(&self, mark: bool) -> Result<PendingReply> {
    self.run(Command::new("revert-seek").arg_opt(mark.then_some("mark")))
  }

  pub fn frame_step(&self) -> Result<PendingReply> {
    self.run(Command::new("frame-step"))
  }

  pub fn frame_back_step(&self) -> Result<PendingReply> {
    self.run(Command::new("frame-back-step"))
  }

  /// Set a property from its string form, like the `set` input command.
  pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<PendingReply> {
    let value = value.into().to_option_string();
    self.run(Command::new("set").arg(name).arg(value))
  }

  /// Add `by` to a numeric property (1 when omitted).
  pub fn add(&self, name: &str, by: Option<f64>) -> Result<PendingReply> {
    self.run(Command::new("add").arg(name).arg_opt(by))
  }

  pub fn cycle(&self, name: &str, direction: CycleDirection) -> Result<PendingReply> {
    let direction = match direction {
      CycleDirection::Up => "up",
      CycleDirection::Down => "down",
    };
    self.run(Command::new("cycle").arg(name).arg(direction))
  }

  pub fn multiply(&self, name: &str, factor: f64) -> Result<PendingReply> {
    self.run(Command::new("multiply").arg(name).arg(factor))
  }

  pub fn screenshot(&self, mode: ScreenshotMode) -> Result<PendingReply> {
    self.run(Command::new("screenshot").arg(mode.as_str()))
  }

  pub fn screenshot_to_file(&self, path: &str, mode: ScreenshotMode) -> Result<PendingReply> {
    self.run(Command::new("screenshot-to-file").arg(path).arg(mode.as_str()))
  }

  /// Replace the playlist with `url` and start playing it.
  pub fn loadfile(&self, url: &str) -> Result<PendingReply> {
    log::info!("Loading file: {}", url);
    self.run(Command::new("loadfile").arg(url))
  }

  /// Load `url` with per-file options such as `start`, `aid` or `sid`.
  ///
  /// Options are applied together with the load, so playback starts with them.
  pub fn loadfile_with_options(
    &self,
    url: &str,
    mode: LoadFileMode,
    options: &[(&str, Value)],
  ) -> Result<PendingReply> {
    let per_file: BTreeMap<String, Value> = options
      .iter()
      .map(|(key, value)| (key.to_string(), Value::from(value.to_option_string())))
      .collect();
    log::info!("Loading file: {} with {} options", url, per_file.len());

    let mut command = Command::new("loadfile")
      .option("url", url)
      .option("flags", mode.as_str());
    if !per_file.is_empty() {
      command = command.option("options", per_file);
    }
    self.run(command)
  }

  pub fn loadlist(&self, url: &str, mode: LoadFileMode) -> Result<PendingReply> {
    self.run(Command::new("loadlist").arg(url).arg(mode.as_str()))
  }

  pub fn playlist_next(&self, step: PlaylistStep) -> Result<PendingReply> {
    self.run(Command::new("playlist-next").arg(step_flag(step)))
  }

  pub fn playlist_prev(&self, step: PlaylistStep) -> Result<PendingReply> {
    self.run(Command::new("playlist-prev").arg(step_flag(step)))
  }

  /// Remove every entry except the one playing.
  pub fn playlist_clear(&self) -> Result<PendingReply> {
    self.run(Command::new("playlist-clear"))
  }

  /// Remove the entry at `index`, or the current one.
  pub fn playlist_remove(&self, index: Option<i64>) -> Result<PendingReply> {
    let target = index.map(Value::from).unwrap_or_else(|| Value::from("current"));
    self.run(Command::new("playlist-remove").arg(target))
  }

  /// Move the entry at `from` so it ends up before `to`.
  pub fn playlist_move(&self, from: i64, to: i64) -> Result<PendingReply> {
    self.run(Command::new("playlist-move").arg(from).arg(to))
  }

  pub fn playlist_shuffle(&self) -> Result<PendingReply> {
    self.run(Command::new("playlist-shuffle"))
  }

  pub fn playlist_unshuffle(&self) -> Result<PendingReply> {
    self.run(Command::new("playlist-unshuffle"))
  }

  pub fn stop(&self, keep_playlist: bool) -> Result<PendingReply> {
    self.run(Command::new("stop").arg_opt(keep_playlist.then_some("keep-playlist")))
  }

  pub fn sub_add(
    &self,
    url: &str,
    flag: TrackFlag,
    title: Option<&str>,
    lang: Option<&str>,
  ) -> Result<PendingReply> {
    self.run(track_add("sub-add", url, flag, title, lang))
  }

  /// Remove an external subtitle track, or the current one.
  pub fn sub_remove(&self, id: Option<i64>) -> Result<PendingReply> {
    self.run(Command::new("sub-remove").arg_opt(id))
  }

  pub fn sub_reload(&self, id: Option<i64>) -> Result<PendingReply> {
    self.run(Command::new("sub-reload").arg_opt(id))
  }

  /// Shift subtitle timing so the line `skip` lines away is shown now.
  pub fn sub_step(&self, skip: i64) -> Result<PendingReply> {
    self.run(Command::new("sub-step").arg(skip))
  }

  /// Seek to the subtitle line `skip` lines away.
  pub fn sub_seek(&self, skip: i64) -> Result<PendingReply> {
    self.run(Command::new("sub-seek").arg(skip))
  }

  pub fn audio_add(
    &self,
    url: &str,
    flag: TrackFlag,
    title: Option<&str>,
    lang: Option<&str>,
  ) -> Result<PendingReply> {
    self.run(track_add("audio-add", url, flag, title, lang))
  }

  pub fn audio_remove(&self, id: Option<i64>) -> Result<PendingReply> {
    self.run(Command::new("audio-remove").arg_opt(id))
  }

  pub fn audio_reload(&self, id: Option<i64>) -> Result<PendingReply> {
    self.run(Command::new("audio-reload").arg_opt(id))
  }

  /// Show `text` on the OSD. `duration_ms` of `None` uses the engine default.
  pub fn show_text(
    &self,
    text: &str,
    duration_ms: Option<i64>,
    level: Option<i64>,
  ) -> Result<PendingReply> {
    // level is positional after duration
    let duration = match (duration_ms, level) {
      (None, Some(_)) => Some(-1),
      (duration, _) => duration,
    };
    self.run(
      Command::new("show-text")
        .arg(text)
        .arg_opt(duration)
        .arg_opt(level),
    )
  }

  pub fn show_progress(&self) -> Result<PendingReply> {
    self.run(Command::new("show-progress"))
  }

  /// Print `text` to the engine's terminal log.
  pub fn print_text(&self, text: &str) -> Result<PendingReply> {
    self.run(Command::new("print-text").arg(text))
  }

  /// Move the mouse to (x, y); with a button, also click it.
  pub fn mouse(&self, x: i64, y: i64, button: Option<i64>, double: bool) -> Result<PendingReply> {
    let mut command = Command::new("mouse").arg(x).arg(y);
    if let Some(button) = button {
      command = command
        .arg(button)
        .arg(if double { "double" } else { "single" });
    }
    self.run(command)
  }

  pub fn keypress(&self, key: &str) -> Result<PendingReply> {
    self.run(Command::new("keypress").arg(key))
  }

  pub fn keydown(&self, key: &str) -> Result<PendingReply> {
    self.run(Command::new("keydown").arg(key))
  }

  /// Release `key`, or every key held down.
  pub fn keyup(&self, key: Option<&str>) -> Result<PendingReply> {
    self.run(Command::new("keyup").arg_opt(key))
  }

  /// Ask the engine to exit. The player reports the resulting fault.
  pub fn quit(&self, code: Option<i64>) -> Result<PendingReply> {
    self.run(Command::new("quit").arg_opt(code))
  }

  pub fn quit_watch_later(&self, code: Option<i64>) -> Result<PendingReply> {
    self.run(Command::new("quit-watch-later").arg_opt(code))
  }

  pub fn write_watch_later_config(&self) -> Result<PendingReply> {
    self.run(Command::new("write-watch-later-config"))
  }
}

fn step_flag(step: PlaylistStep) -> &'static str {
  match step {
    PlaylistStep::Weak => "weak",
    PlaylistStep::Force => "force",
  }
}

fn track_add(
  name: &str,
  url: &str,
  flag: TrackFlag,
  title: Option<&str>,
  lang: Option<&str>,
) -> Command {
  // lang is positional after title
  let title = match (title, lang) {
    (None, Some(_)) => Some(""),
    (title, _) => title,
  };
  Command::new(name)
    .arg(url)
    .arg(flag.as_str())
    .arg_opt(title)
    .arg_opt(lang)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::engine::testing::{Script, ScriptedEngine};
  use crate::player::tests_support::surface;
  use crate::player::PlayerOptions;

  fn player() -> (Player<ScriptedEngine>, Script) {
    let (engine, script) = ScriptedEngine::new();
    let mut player = Player::new(surface(), engine, PlayerOptions::new());
    player.create().unwrap();
    (player, script)
  }

  async fn last(script: &Script, reply: Result<PendingReply>) -> Command {
    reply.unwrap().await.unwrap();
    script.commands.lock().last().cloned().unwrap()
  }

  #[tokio::test]
  async fn test_seek_flags() {
    let (player, script) = player();
    let cmds = player.commands();
    assert_eq!(
      last(&script, cmds.seek(10.0, SeekMode::Absolute)).await,
      Command::new("seek").arg(10.0).arg("absolute")
    );
    assert_eq!(
      last(
        &script,
        cmds.seek_with(-5.0, SeekMode::Relative, SeekPrecision::Exact)
      )
      .await,
      Command::new("seek").arg(-5.0).arg("relative+exact")
    );
    assert_eq!(
      last(&script, cmds.revert_seek(true)).await,
      Command::new("revert-seek").arg("mark")
    );
  }

  #[tokio::test]
  async fn test_loadfile_with_options_uses_named_form() {
    let (player, script) = player();
    let cmd = last(
      &script,
      player.commands().loadfile_with_options(
        "missing.mkv",
        LoadFileMode::AppendPlay,
        &[("start", Value::Double(30.0)), ("sid", Value::Flag(false))],
      ),
    )
    .await;

    assert_eq!(cmd.name(), "loadfile");
    assert!(cmd.positional().is_empty());
    assert_eq!(cmd.options().get("url"), Some(&Value::from("missing.mkv")));
    assert_eq!(cmd.options().get("flags"), Some(&Value::from("append-play")));
    let per_file = cmd.options().get("options").unwrap();
    assert_eq!(per_file.get("start"), Some(&Value::from("30")));
    assert_eq!(per_file.get("sid"), Some(&Value::from("no")));
  }

  #[tokio::test]
  async fn test_optional_positionals_stay_in_order() {
    let (player, script) = player();
    let cmds = player.commands();
    assert_eq!(
      last(&script, cmds.sub_add("a.srt", TrackFlag::Cached, None, Some("en"))).await,
      Command::new("sub-add").arg("a.srt").arg("cached").arg("").arg("en")
    );
    assert_eq!(
      last(&script, cmds.show_text("hi", None, Some(2))).await,
      Command::new("show-text").arg("hi").arg(-1i64).arg(2i64)
    );
    assert_eq!(
      last(&script, cmds.mouse(10, 20, Some(0), true)).await,
      Command::new("mouse").arg(10i64).arg(20i64).arg(0i64).arg("double")
    );
    assert_eq!(
      last(&script, cmds.playlist_remove(None)).await,
      Command::new("playlist-remove").arg("current")
    );
    assert_eq!(
      last(&script, cmds.stop(true)).await,
      Command::new("stop").arg("keep-playlist")
    );
    assert_eq!(last(&script, cmds.keyup(None)).await, Command::new("keyup"));
  }

  #[tokio::test]
  async fn test_set_uses_string_form() {
    let (player, script) = player();
    assert_eq!(
      last(&script, player.commands().set("pause", true)).await,
      Command::new("set").arg("pause").arg("yes")
    );
    assert_eq!(
      last(&script, player.commands().cycle("mute", CycleDirection::Down)).await,
      Command::new("cycle").arg("mute").arg("down")
    );
  }

  #[test]
  fn test_facade_after_dispose() {
    let (mut player, _script) = player();
    player.dispose();
    assert_eq!(
      player.commands().frame_step().err(),
      Some(crate::error::ErrorCode::Uninitialized)
    );
  }
}
