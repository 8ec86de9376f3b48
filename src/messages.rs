//! The message taxonomy carried over the bus. Messages are value-typed
//! and copied in and out of the queue whole — there is no wire encoding
//! here, because the bus never leaves shared memory.
//!
//! All participating processes are forked from the same compiled image
//! (see [`crate::bus::shm`]), so a plain Rust enum has an identical,
//! stable layout on both sides of the fork. No `#[repr(C)]` tagged union
//! is needed to move `Message` through the shared segment; only the
//! *size* of `Message` has to be known up front, which
//! [`MAX_MESSAGE_BYTES`] asserts at compile time.

use crate::common::{ComponentId, FlightState, Position};

/// Topic a [`Message`] is published under; subscriptions match on this
/// value alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MessageType {
  PositionUpdate = 0,
  StateRequest = 1,
  StateResponse = 2,
  AutopilotCommand = 3,
  SystemStatus = 4,
}

/// Per-message header. `receiver` is informational only: the bus does
/// not use it to route (see [`crate::bus`] module docs) — preserved
/// deliberately, not a bug to "fix".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MessageHeader {
  pub msg_type: MessageType,
  pub sender: ComponentId,
  pub receiver: ComponentId,
  pub timestamp: u64,
  pub size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessagePayload {
  PositionUpdate { position: Position },
  StateRequest,
  StateResponse { state: FlightState },
  AutopilotCommand {
    target_heading: f64,
    target_speed: f64,
    target_altitude: f64,
  },
  SystemStatus { component_active: bool },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Message {
  pub header: MessageHeader,
  pub payload: MessagePayload,
}

/// Conservative upper bound on an encoded `Message`'s footprint, matching
/// the original's `MAX_MESSAGE_SIZE`. Nothing in this crate serializes a
/// `Message` to bytes, but the bound still documents the size budget a
/// wire-compatible reimplementation would have to respect.
pub const MAX_MESSAGE_BYTES: usize = 1024;

static_assertions::const_assert!(std::mem::size_of::<Message>() <= MAX_MESSAGE_BYTES);

impl Message {
  /// Zero-ish placeholder used only to give the bus's ring buffer an
  /// initial value before any real message is published into a slot.
  pub(crate) const EMPTY: Message = Message {
    header: MessageHeader {
      msg_type: MessageType::StateRequest,
      sender: ComponentId::FlightController,
      receiver: ComponentId::FlightController,
      timestamp: 0,
      size: 0,
    },
    payload: MessagePayload::StateRequest,
  };

  pub fn position_update(sender: ComponentId, position: Position) -> Self {
    Self {
      header: MessageHeader {
        msg_type: MessageType::PositionUpdate,
        sender,
        receiver: ComponentId::FlightController,
        timestamp: crate::common::unix_timestamp(),
        size: std::mem::size_of::<Position>(),
      },
      payload: MessagePayload::PositionUpdate { position },
    }
  }

  pub fn state_request(sender: ComponentId) -> Self {
    Self {
      header: MessageHeader {
        msg_type: MessageType::StateRequest,
        sender,
        receiver: ComponentId::FlightController,
        timestamp: crate::common::unix_timestamp(),
        size: 0,
      },
      payload: MessagePayload::StateRequest,
    }
  }

  pub fn state_response(sender: ComponentId, receiver: ComponentId, state: FlightState) -> Self {
    Self {
      header: MessageHeader {
        msg_type: MessageType::StateResponse,
        sender,
        receiver,
        timestamp: crate::common::unix_timestamp(),
        size: std::mem::size_of::<FlightState>(),
      },
      payload: MessagePayload::StateResponse { state },
    }
  }

  pub fn autopilot_command(
    sender: ComponentId,
    target_heading: f64,
    target_speed: f64,
    target_altitude: f64,
  ) -> Self {
    Self {
      header: MessageHeader {
        msg_type: MessageType::AutopilotCommand,
        sender,
        receiver: ComponentId::FlightController,
        timestamp: crate::common::unix_timestamp(),
        size: std::mem::size_of::<f64>() * 3,
      },
      payload: MessagePayload::AutopilotCommand {
        target_heading,
        target_speed,
        target_altitude,
      },
    }
  }

  pub fn system_status(sender: ComponentId, component_active: bool) -> Self {
    Self {
      header: MessageHeader {
        msg_type: MessageType::SystemStatus,
        sender,
        receiver: ComponentId::FlightController,
        timestamp: crate::common::unix_timestamp(),
        size: std::mem::size_of::<bool>(),
      },
      payload: MessagePayload::SystemStatus { component_active },
    }
  }
}
