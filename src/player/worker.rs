//! The engine worker thread.
//!
//! Each player runs its engine on a dedicated thread with a current-thread
//! tokio runtime. Requests are executed one at a time in queue order.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use async_channel::Receiver;
use tokio_util::sync::CancellationToken;

use super::dispatcher::{Envelope, Request};
use super::frame::SurfaceInfo;
use crate::engine::{Engine, EngineContext};
use crate::error::{ErrorCode, Result};
use crate::event::{Event, LogLevel, LogMessage};
use crate::value::Value;

/// How long a cancelled worker gets to finish engine shutdown.
const CANCEL_GRACE: Duration = Duration::from_millis(250);

/// Why the worker could not be started.
pub(crate) struct StartError<E> {
  pub code: ErrorCode,
  /// The engine, when the worker could hand it back.
  pub engine: Option<E>,
}

type InitResult<E> = std::result::Result<(), (ErrorCode, E)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopOutcome {
  Drained,
  Cancelled,
  Detached,
}

/// Handle to a running worker thread.
pub(crate) struct Worker {
  thread: Option<JoinHandle<()>>,
  done: mpsc::Receiver<()>,
  cancel: CancellationToken,
}

/// Reports a fault if the worker unwinds, and signals completion either way.
struct ExitGuard {
  ctx: EngineContext,
  done: mpsc::Sender<()>,
}

impl Drop for ExitGuard {
  fn drop(&mut self) {
    if thread::panicking() {
      self.ctx.report_fault("engine worker panicked");
    }
    let _ = self.done.send(());
  }
}

impl Worker {
  /// Start `engine` on a new thread and wait for it to initialize.
  pub(crate) fn start<E: Engine>(
    engine: E,
    surface: SurfaceInfo,
    ctx: EngineContext,
    requests: Receiver<Envelope>,
    startup_timeout: Duration,
  ) -> std::result::Result<Self, StartError<E>> {
    let (init_tx, init_rx) = mpsc::channel::<InitResult<E>>();
    let (done_tx, done_rx) = mpsc::channel();
    let cancel = CancellationToken::new();

    let thread_cancel = cancel.clone();
    let spawned = thread::Builder::new()
      .name("mpv-player-worker".to_string())
      .spawn(move || run(engine, surface, ctx, requests, thread_cancel, init_tx, done_tx));

    let thread = match spawned {
      Ok(thread) => thread,
      Err(e) => {
        log::error!("Failed to spawn engine worker: {}", e);
        return Err(StartError {
          code: ErrorCode::NoMem,
          engine: None,
        });
      }
    };

    match init_rx.recv_timeout(startup_timeout) {
      Ok(Ok(())) => Ok(Self {
        thread: Some(thread),
        done: done_rx,
        cancel,
      }),
      Ok(Err((code, engine))) => {
        let _ = thread.join();
        Err(StartError {
          code,
          engine: Some(engine),
        })
      }
      Err(mpsc::RecvTimeoutError::Timeout) => {
        log::warn!(
          "Engine did not initialize within {} ms",
          startup_timeout.as_millis()
        );
        cancel.cancel();
        Err(StartError {
          code: ErrorCode::Generic,
          engine: None,
        })
      }
      Err(mpsc::RecvTimeoutError::Disconnected) => {
        let _ = thread.join();
        Err(StartError {
          code: ErrorCode::Generic,
          engine: None,
        })
      }
    }
  }

  /// Wait up to `timeout` for the worker to drain its queue, then cancel it.
  ///
  /// The request queue must already be closed.
  pub(crate) fn stop(mut self, timeout: Duration) -> StopOutcome {
    let outcome = match self.done.recv_timeout(timeout) {
      Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => StopOutcome::Drained,
      Err(mpsc::RecvTimeoutError::Timeout) => {
        self.cancel.cancel();
        match self.done.recv_timeout(CANCEL_GRACE) {
          Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => StopOutcome::Cancelled,
          Err(mpsc::RecvTimeoutError::Timeout) => StopOutcome::Detached,
        }
      }
    };
    self.cancel.cancel();

    if outcome == StopOutcome::Detached {
      log::warn!("Engine worker did not stop, detaching it");
      self.thread.take();
    } else if let Some(thread) = self.thread.take() {
      let _ = thread.join();
    }
    outcome
  }
}

fn run<E: Engine>(
  mut engine: E,
  surface: SurfaceInfo,
  ctx: EngineContext,
  requests: Receiver<Envelope>,
  cancel: CancellationToken,
  init_tx: mpsc::Sender<InitResult<E>>,
  done_tx: mpsc::Sender<()>,
) {
  let _guard = ExitGuard {
    ctx: ctx.clone(),
    done: done_tx,
  };

  let runtime = match tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
  {
    Ok(runtime) => runtime,
    Err(e) => {
      log::error!("Failed to build engine runtime: {}", e);
      let _ = init_tx.send(Err((ErrorCode::NoMem, engine)));
      return;
    }
  };

  let init = runtime.block_on(async {
    tokio::select! {
      biased;
      _ = cancel.cancelled() => Err(ErrorCode::Uninitialized),
      result = engine.initialize(surface, ctx.clone()) => result,
    }
  });

  if let Err(code) = init {
    log::warn!("Engine initialization failed: {}", code);
    if let Err(mpsc::SendError(Err((_, mut engine)))) = init_tx.send(Err((code, engine))) {
      // nobody is waiting any more
      runtime.block_on(engine.shutdown());
    }
    return;
  }

  if init_tx.send(Ok(())).is_err() {
    runtime.block_on(engine.shutdown());
    return;
  }

  log::info!("Engine worker running");
  runtime.block_on(async {
    serve(&mut engine, &ctx, &requests, &cancel).await;
    engine.shutdown().await;
  });

  // anything still queued never reaches the engine
  requests.close();
  while let Ok(envelope) = requests.try_recv() {
    if let Some(reply) = envelope.reply {
      let _ = reply.send(Err(ErrorCode::Uninitialized));
    }
  }
  log::info!("Engine worker stopped");
}

async fn serve<E: Engine>(
  engine: &mut E,
  ctx: &EngineContext,
  requests: &Receiver<Envelope>,
  cancel: &CancellationToken,
) {
  let lost = ctx.lost_token();

  loop {
    let envelope = tokio::select! {
      biased;
      _ = cancel.cancelled() => break,
      _ = lost.cancelled() => break,
      next = requests.recv() => match next {
        Ok(envelope) => envelope,
        Err(_) => break,
      },
    };

    let Envelope { request, reply } = envelope;
    let description = request.describe();
    log::debug!("Executing {}", description);

    let result = tokio::select! {
      biased;
      _ = cancel.cancelled() => Err(ErrorCode::Uninitialized),
      _ = lost.cancelled() => Err(ErrorCode::Uninitialized),
      result = execute(engine, request) => result,
    };

    match reply {
      Some(reply) => {
        let _ = reply.send(result);
      }
      None => {
        if let Err(code) = result {
          log::warn!("{} failed: {}", description, code);
          ctx.emit(Event::LogMessage(LogMessage::new(
            "binding",
            LogLevel::Error,
            format!("{} failed: {}", description, code),
          )));
        }
      }
    }
  }
}

async fn execute<E: Engine>(engine: &mut E, request: Request) -> Result<Value> {
  match request {
    Request::Command(command) => engine.command(&command).await,
    Request::GetProperty(name) => engine.get_property(&name).await,
    Request::SetProperty(name, value) => engine
      .set_property(&name, &value)
      .await
      .map(|()| Value::None),
    Request::Observe(id, name) => engine
      .observe_property(id, &name)
      .await
      .map(|()| Value::None),
    Request::Unobserve(id) => engine.unobserve_property(id).await.map(|()| Value::None),
  }
}
