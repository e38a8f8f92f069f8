//! Async IPC connection to mpv.
//!
//! Handles platform-specific socket/pipe connections.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::protocol::{MpvCommand, MpvEvent, MpvMessage, MpvResponse};
use crate::error::ErrorCode;

#[derive(Error, Debug)]
pub enum IpcError {
  #[error("Connection failed: {0}")]
  ConnectionFailed(String),
  #[error("Write failed: {0}")]
  WriteFailed(#[from] std::io::Error),
  #[error("Encoding failed: {0}")]
  Encode(#[from] serde_json::Error),
  #[error("Command timeout")]
  Timeout,
  #[error("Disconnected")]
  Disconnected,
}

impl From<IpcError> for ErrorCode {
  fn from(error: IpcError) -> Self {
    match error {
      IpcError::Disconnected => ErrorCode::Uninitialized,
      IpcError::Encode(_) => ErrorCode::InvalidParameter,
      _ => ErrorCode::Generic,
    }
  }
}

/// Pending request waiting for response.
type PendingRequest = oneshot::Sender<MpvResponse>;

/// IPC connection state shared between writer and reader.
#[derive(Default)]
struct IpcState {
  pending: HashMap<i64, PendingRequest>,
}

/// Writer channel message.
enum WriteMessage {
  Command(Vec<u8>),
  Close,
}

/// Callbacks the reader task reports to.
pub struct IpcHandlers {
  /// Every event line mpv sends.
  pub on_event: Box<dyn FnMut(MpvEvent) + Send>,
  /// The connection ended without `close()` being called.
  pub on_lost: Box<dyn FnOnce(String) + Send>,
}

/// mpv IPC connection.
pub struct MpvIpc {
  state: Arc<Mutex<IpcState>>,
  write_tx: async_channel::Sender<WriteMessage>,
  next_id: AtomicI64,
  timeout: Duration,
  closing: Arc<AtomicBool>,
  reader_handle: JoinHandle<()>,
  _writer_handle: JoinHandle<()>,
}

impl MpvIpc {
  /// Connect to the mpv IPC socket/pipe, retrying while mpv starts up.
  pub async fn connect(
    path: &str,
    retry_count: u32,
    timeout: Duration,
    handlers: IpcHandlers,
  ) -> Result<Self, IpcError> {
    let mut last_error = None;

    for attempt in 0..retry_count {
      if attempt > 0 {
        tokio::time::sleep(Duration::from_millis(100 * (attempt as u64 + 1))).await;
      }

      match Self::try_connect(path).await {
        Ok((reader, writer)) => return Ok(Self::setup(reader, writer, timeout, handlers)),
        Err(e) => {
          log::debug!("IPC connect attempt {} failed: {}", attempt + 1, e);
          last_error = Some(e);
        }
      }
    }

    Err(last_error.unwrap_or_else(|| IpcError::ConnectionFailed("no attempts made".into())))
  }

  #[cfg(windows)]
  async fn try_connect(
    path: &str,
  ) -> Result<
    (
      impl tokio::io::AsyncRead + Send + Unpin + 'static,
      impl tokio::io::AsyncWrite + Send + Unpin + 'static,
    ),
    IpcError,
  > {
    use tokio::net::windows::named_pipe::ClientOptions;

    let client = ClientOptions::new()
      .open(path)
      .map_err(|e| IpcError::ConnectionFailed(format!("Failed to open pipe: {}", e)))?;

    Ok(tokio::io::split(client))
  }

  #[cfg(not(windows))]
  async fn try_connect(
    path: &str,
  ) -> Result<
    (
      impl tokio::io::AsyncRead + Send + Unpin + 'static,
      impl tokio::io::AsyncWrite + Send + Unpin + 'static,
    ),
    IpcError,
  > {
    use tokio::net::UnixStream;

    let stream = UnixStream::connect(path)
      .await
      .map_err(|e| IpcError::ConnectionFailed(e.to_string()))?;

    Ok(stream.into_split())
  }

  /// Start the reader and writer tasks on an established stream.
  pub fn setup<R, W>(reader: R, writer: W, timeout: Duration, handlers: IpcHandlers) -> Self
  where
    R: tokio::io::AsyncRead + Send + Unpin + 'static,
    W: tokio::io::AsyncWrite + Send + Unpin + 'static,
  {
    let state = Arc::new(Mutex::new(IpcState::default()));
    let closing = Arc::new(AtomicBool::new(false));
    let (write_tx, write_rx) = async_channel::unbounded::<WriteMessage>();

    let reader_state = state.clone();
    let reader_closing = closing.clone();
    let reader_handle = tokio::spawn(async move {
      let reason = Self::reader_loop(reader, &reader_state, handlers.on_event).await;
      // fail every waiting request
      reader_state.lock().pending.clear();
      if !reader_closing.load(Ordering::Acquire) {
        (handlers.on_lost)(reason);
      }
    });

    let writer_handle = tokio::spawn(async move {
      Self::writer_loop(writer, write_rx).await;
    });

    Self {
      state,
      write_tx,
      next_id: AtomicI64::new(1),
      timeout,
      closing,
      reader_handle,
      _writer_handle: writer_handle,
    }
  }

  /// Read until the stream ends; returns why it ended.
  async fn reader_loop<R: tokio::io::AsyncRead + Unpin>(
    reader: R,
    state: &Mutex<IpcState>,
    mut on_event: Box<dyn FnMut(MpvEvent) + Send>,
  ) -> String {
    log::info!("mpv IPC reader loop started");
    let mut buf_reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
      line.clear();
      match buf_reader.read_line(&mut line).await {
        Ok(0) => {
          log::info!("mpv IPC connection closed");
          return "mpv IPC connection closed".to_string();
        }
        Ok(_) => {
          let trimmed = line.trim();
          if trimmed.is_empty() {
            continue;
          }

          match MpvMessage::parse(trimmed) {
            Ok(MpvMessage::Response(response)) => {
              log::debug!("mpv reader: response for request_id={}", response.request_id);
              let waiting = state.lock().pending.remove(&response.request_id);
              match waiting {
                Some(tx) => {
                  let _ = tx.send(response);
                }
                None => log::debug!("Dropping late response {}", response.request_id),
              }
            }
            Ok(MpvMessage::Event(event)) => {
              log::debug!("mpv reader: event {}", event.event);
              on_event(event);
            }
            Err(e) => {
              log::warn!("Failed to parse mpv message: {} - {}", e, trimmed);
            }
          }
        }
        Err(e) => {
          log::error!("mpv IPC read error: {}", e);
          return format!("mpv IPC read error: {}", e);
        }
      }
    }
  }

  async fn writer_loop<W: tokio::io::AsyncWrite + Unpin>(
    mut writer: W,
    write_rx: async_channel::Receiver<WriteMessage>,
  ) {
    while let Ok(msg) = write_rx.recv().await {
      match msg {
        WriteMessage::Command(mut data) => {
          data.push(b'\n');
          if let Err(e) = writer.write_all(&data).await {
            log::error!("mpv IPC write error: {}", e);
            break;
          }
          if let Err(e) = writer.flush().await {
            log::error!("mpv IPC flush error: {}", e);
            break;
          }
        }
        WriteMessage::Close => {
          log::info!("mpv IPC writer closing");
          let _ = writer.shutdown().await;
          break;
        }
      }
    }
  }

  /// Send a command to mpv and wait for its response.
  pub async fn send_command(&self, cmd: &MpvCommand) -> Result<MpvResponse, IpcError> {
    let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);
    let line = cmd.to_line(request_id)?;

    let (tx, rx) = oneshot::channel();
    self.state.lock().pending.insert(request_id, tx);

    log::debug!("Sending mpv command: {}", line);
    if self
      .write_tx
      .send(WriteMessage::Command(line.into_bytes()))
      .await
      .is_err()
    {
      self.state.lock().pending.remove(&request_id);
      return Err(IpcError::Disconnected);
    }

    match tokio::time::timeout(self.timeout, rx).await {
      Ok(Ok(response)) => Ok(response),
      Ok(Err(_)) => Err(IpcError::Disconnected),
      Err(_) => {
        log::error!(
          "mpv command timeout after {} ms, request_id={}",
          self.timeout.as_millis(),
          request_id
        );
        self.state.lock().pending.remove(&request_id);
        Err(IpcError::Timeout)
      }
    }
  }

  /// Close the connection. The reader ending afterwards is not a fault.
  pub fn close(&self) {
    self.closing.store(true, Ordering::Release);
    let _ = self.write_tx.try_send(WriteMessage::Close);
  }
}

impl Drop for MpvIpc {
  fn drop(&mut self) {
    self.closing.store(true, Ordering::Release);
    self.write_tx.close();
    self.reader_handle.abort();
  }
}
