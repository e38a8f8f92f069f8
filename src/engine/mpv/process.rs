//! mpv process detection and spawning.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use thiserror::Error;

use crate::config::MpvConfig;
use crate::error::ErrorCode;
use crate::player::SurfaceInfo;

#[derive(Error, Debug)]
pub enum ProcessError {
  #[error("mpv executable not found")]
  NotFound,
  #[error("Failed to spawn mpv: {0}")]
  SpawnFailed(#[from] std::io::Error),
}

impl From<ProcessError> for ErrorCode {
  fn from(error: ProcessError) -> Self {
    match error {
      ProcessError::NotFound => ErrorCode::Unsupported,
      ProcessError::SpawnFailed(_) => ErrorCode::Generic,
    }
  }
}

/// A fresh IPC socket/pipe path, unique per player.
pub fn ipc_path(socket_dir: &Path) -> String {
  let name = format!("mpv-player-{}", uuid::Uuid::new_v4().simple());
  #[cfg(windows)]
  {
    let _ = socket_dir;
    format!(r"\\.\pipe\{}", name)
  }
  #[cfg(not(windows))]
  {
    socket_dir
      .join(format!("{}.sock", name))
      .to_string_lossy()
      .into_owned()
  }
}

/// Find the mpv executable in PATH or common locations.
pub fn find_mpv() -> Option<PathBuf> {
  if let Ok(path) = which::which("mpv") {
    return Some(path);
  }

  #[cfg(windows)]
  let common_paths: &[&str] = &[
    r"C:\Program Files\mpv\mpv.exe",
    r"C:\Program Files (x86)\mpv\mpv.exe",
    r"C:\mpv\mpv.exe",
  ];
  #[cfg(target_os = "macos")]
  let common_paths: &[&str] = &[
    "/usr/local/bin/mpv",
    "/opt/homebrew/bin/mpv",
    "/Applications/mpv.app/Contents/MacOS/mpv",
  ];
  #[cfg(not(any(windows, target_os = "macos")))]
  let common_paths: &[&str] = &["/usr/bin/mpv", "/usr/local/bin/mpv"];

  common_paths.iter().map(PathBuf::from).find(|p| p.exists())
}

/// Command-line arguments for an embedded, IPC-driven mpv.
pub fn mpv_args(config: &MpvConfig, surface: &SurfaceInfo, ipc: &str) -> Vec<String> {
  let mut args = vec![
    format!("--input-ipc-server={}", ipc),
    "--idle=yes".to_string(),
    "--keep-open=no".to_string(),
    "--no-terminal".to_string(),
    "--no-input-default-bindings".to_string(),
  ];

  if let Some(handle) = surface.native_handle {
    args.push(format!("--wid={}", handle));
    args.push("--force-window=yes".to_string());
  } else if surface.width > 0 && surface.height > 0 {
    args.push(format!("--geometry={}x{}", surface.width, surface.height));
  }

  for (key, value) in &config.options {
    args.push(format!("--{}={}", key, value));
  }
  args.extend(config.mpv_args.iter().cloned());
  args
}

/// Spawn mpv with the IPC server listening on `ipc`.
pub fn spawn_mpv(config: &MpvConfig, surface: &SurfaceInfo, ipc: &str) -> Result<Child, ProcessError> {
  let mpv_exe = config
    .mpv_path()
    .or_else(find_mpv)
    .ok_or(ProcessError::NotFound)?;

  let args = mpv_args(config, surface, ipc);
  log::info!("Spawning mpv: {:?} with IPC: {}", mpv_exe, ipc);
  log::debug!("mpv args: {:?}", args);

  let child = Command::new(&mpv_exe)
    .args(&args)
    .stdin(Stdio::null())
    .stdout(Stdio::null())
    .stderr(Stdio::null())
    .spawn()?;

  Ok(child)
}

/// Remove a leftover IPC socket.
pub fn cleanup_ipc(path: &str) {
  #[cfg(not(windows))]
  {
    let _ = std::fs::remove_file(path);
  }
  // Windows named pipes are cleaned up automatically
  #[cfg(windows)]
  let _ = path;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_ipc_paths_are_unique() {
    let dir = std::env::temp_dir();
    let a = ipc_path(&dir);
    let b = ipc_path(&dir);
    assert_ne!(a, b);
    #[cfg(not(windows))]
    assert!(a.starts_with(dir.to_string_lossy().as_ref()) && a.ends_with(".sock"));
  }

  #[test]
  fn test_args_embed_into_surface() {
    let config = MpvConfig {
      mpv_args: vec!["--mute=yes".to_string()],
      ..MpvConfig::default()
    };
    let surface = SurfaceInfo {
      width: 640,
      height: 360,
      native_handle: Some(42),
    };
    let args = mpv_args(&config, &surface, "/tmp/x.sock");
    assert_eq!(args[0], "--input-ipc-server=/tmp/x.sock");
    assert!(args.contains(&"--wid=42".to_string()));
    assert!(args.contains(&"--hwdec=no".to_string()));
    assert!(args.contains(&"--sub-auto=no".to_string()));
    assert_eq!(args.last().map(String::as_str), Some("--mute=yes"));
    assert!(!args.iter().any(|a| a.starts_with("--geometry")));
  }

  #[test]
  fn test_args_without_handle_use_geometry() {
    let surface = SurfaceInfo {
      width: 800,
      height: 600,
      native_handle: None,
    };
    let args = mpv_args(&MpvConfig::default(), &surface, "pipe");
    assert!(args.contains(&"--geometry=800x600".to_string()));
    assert!(!args.iter().any(|a| a.starts_with("--wid")));
  }

  #[test]
  fn test_missing_executable() {
    let config = MpvConfig {
      mpv_path: Some("/nonexistent/mpv-binary".to_string()),
      ..MpvConfig::default()
    };
    let result = spawn_mpv(&config, &SurfaceInfo::default(), "pipe");
    assert!(matches!(result, Err(ProcessError::SpawnFailed(_))));
  }
}
