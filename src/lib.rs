//! Core of a multi-process aircraft flight-control simulator.
//!
//! Three pieces make up the hard part of this crate:
//!
//! - [`bus`]: a bounded, topic-subscribed message queue living in shared
//!   memory, so independently forked processes can publish and consume
//!   typed [`messages::Message`]s without sharing address space.
//! - [`flight_controller`]: the supervisor that forks the sensor/autopilot
//!   processes, fuses redundant position sources into one
//!   [`flight_state::ExtendedFlightState`], answers state queries, and
//!   restarts crashed children.
//! - [`autopilot`]: three independent saturating PID loops driving the
//!   aircraft toward a configured waypoint.
//!
//! [`components`] holds the external-sensor contract stubs (GPS, INS,
//! landing radio, SATCOM): real TCP clients that speak the ASCII feeds
//! described in the system's external interfaces, but whose internal
//! fidelity is out of scope — only the bus messages they produce matter.

pub mod autopilot;
pub mod bus;
pub mod common;
pub mod components;
pub mod error;
pub mod flight_controller;
pub mod flight_state;
pub mod logging;
pub mod messages;

pub use common::{ComponentId, FlightState, Position};
pub use error::{Result, SimError};
