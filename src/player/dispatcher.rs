//! Command admission and the queue feeding the engine worker.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_channel::{Receiver, Sender, TrySendError};
use futures_util::FutureExt;
use tokio::sync::oneshot;

use super::observe::SubscriptionId;
use crate::error::{ErrorCode, Result};
use crate::value::Value;

/// A named engine command with positional arguments and keyword options.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
  name: String,
  args: Vec<Value>,
  options: BTreeMap<String, Value>,
}

impl Command {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      args: Vec::new(),
      options: BTreeMap::new(),
    }
  }

  /// Append a positional argument.
  pub fn arg(mut self, value: impl Into<Value>) -> Self {
    self.args.push(value.into());
    self
  }

  /// Append a positional argument only when present.
  pub fn arg_opt<V: Into<Value>>(self, value: Option<V>) -> Self {
    match value {
      Some(value) => self.arg(value),
      None => self,
    }
  }

  pub fn args<I, V>(mut self, values: I) -> Self
  where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
  {
    self.args.extend(values.into_iter().map(Into::into));
    self
  }

  /// Set a keyword option.
  pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
    self.options.insert(key.into(), value.into());
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn positional(&self) -> &[Value] {
    &self.args
  }

  pub fn options(&self) -> &BTreeMap<String, Value> {
    &self.options
  }
}

/// Work item for the engine worker.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Request {
  Command(Command),
  GetProperty(String),
  SetProperty(String, Value),
  Observe(SubscriptionId, String),
  Unobserve(SubscriptionId),
}

impl Request {
  pub(crate) fn describe(&self) -> String {
    match self {
      Request::Command(c) => format!("command {}", c.name()),
      Request::GetProperty(name) => format!("get_property {}", name),
      Request::SetProperty(name, _) => format!("set_property {}", name),
      Request::Observe(id, name) => format!("observe_property {} {}", id, name),
      Request::Unobserve(id) => format!("unobserve_property {}", id),
    }
  }
}

/// A request plus the channel its result is reported on.
pub(crate) struct Envelope {
  pub request: Request,
  pub reply: Option<oneshot::Sender<Result<Value>>>,
}

/// Result of a queued request.
///
/// Resolves once the engine has processed the request. A reply whose player
/// was disposed first resolves to [`ErrorCode::Uninitialized`].
#[derive(Debug)]
#[must_use = "the reply carries the command's result"]
pub struct PendingReply {
  rx: oneshot::Receiver<Result<Value>>,
}

impl PendingReply {
  /// Take the result if the engine already finished, without waiting.
  pub fn try_take(&mut self) -> Option<Result<Value>> {
    match self.rx.try_recv() {
      Ok(result) => Some(result),
      Err(oneshot::error::TryRecvError::Empty) => None,
      Err(oneshot::error::TryRecvError::Closed) => Some(Err(ErrorCode::Uninitialized)),
    }
  }
}

impl Future for PendingReply {
  type Output = Result<Value>;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    self
      .rx
      .poll_unpin(cx)
      .map(|result| result.unwrap_or(Err(ErrorCode::Uninitialized)))
  }
}

/// Bounded, non-blocking admission into the engine's request queue.
pub(crate) struct Dispatcher {
  tx: Sender<Envelope>,
}

impl Dispatcher {
  pub(crate) fn new(capacity: usize) -> (Self, Receiver<Envelope>) {
    let (tx, rx) = async_channel::bounded(capacity);
    (Self { tx }, rx)
  }

  /// Queue a request whose result the caller wants.
  pub(crate) fn submit(&self, request: Request) -> Result<PendingReply> {
    let (reply, rx) = oneshot::channel();
    self.admit(Envelope {
      request,
      reply: Some(reply),
    })?;
    Ok(PendingReply { rx })
  }

  /// Queue a request without a reply; failures are reported by the worker.
  pub(crate) fn notify(&self, request: Request) -> Result<()> {
    self.admit(Envelope {
      request,
      reply: None,
    })
  }

  fn admit(&self, envelope: Envelope) -> Result<()> {
    if let Request::Command(command) = &envelope.request {
      if command.name().trim().is_empty() {
        return Err(ErrorCode::InvalidParameter);
      }
    }
    match self.tx.try_send(envelope) {
      Ok(()) => Ok(()),
      Err(TrySendError::Full(envelope)) => {
        log::warn!("Command queue full, rejecting {}", envelope.request.describe());
        Err(ErrorCode::QueueFull)
      }
      Err(TrySendError::Closed(_)) => Err(ErrorCode::Uninitialized),
    }
  }

  /// Number of requests waiting for the worker.
  pub(crate) fn queued(&self) -> usize {
    self.tx.len()
  }

  /// Stop admitting requests. Queued requests are still delivered.
  pub(crate) fn close(&self) {
    self.tx.close();
  }
}
