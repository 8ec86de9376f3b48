//! Error taxonomy: local recovery where possible, fatal only on true
//! resource exhaustion. Nothing here unwinds across process boundaries —
//! each component is responsible for cleaning up its own resources
//! before it exits.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
  /// Shared memory segment or named mutex could not be created/opened, or
  /// a listening socket could not be bound. Fatal at init.
  #[error("resource unavailable: {0}")]
  ResourceUnavailable(String),

  /// `publish` was attempted against a full ring buffer. Non-fatal: the
  /// caller logs and drops the message.
  #[error("message queue full")]
  QueueFull,

  /// `subscribe` was attempted with no free subscription slot. Fatal for
  /// the caller: it cannot receive what it needs.
  #[error("no free subscription slot")]
  NoSlot,

  /// Null/out-of-range parameters or a malformed external frame. Logged,
  /// operation refused, caller continues.
  #[error("invalid input: {0}")]
  InvalidInput(String),

  /// An external TCP feed closed or errored. Non-fatal: the component
  /// reconnects with backoff.
  #[error("communication lost: {0}")]
  CommunicationLoss(String),

  /// The supervisor observed a child process terminate.
  #[error("child exited: {0}")]
  ChildExit(ComponentLabel),
}

/// Thin wrapper so `ChildExit`'s payload prints a component name instead
/// of a bare discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentLabel(pub crate::common::ComponentId);

impl std::fmt::Display for ComponentLabel {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

pub type Result<T> = std::result::Result<T, SimError>;
