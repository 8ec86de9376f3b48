//! Shared data model: component identities and the basic position/flight
//! state types every other module builds on.

use std::time::{SystemTime, UNIX_EPOCH};

/// Physical constants used by the components and autopilot geometry.
pub mod physics {
  pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
  pub const KNOTS_TO_MS: f64 = 0.51444;
}

/// Identity of a process participating in the simulation. Values below
/// [`MAX_COMPONENTS`] are used as array indices for per-component state
/// (subscriptions, supervised PIDs, nav slots).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum ComponentId {
  FlightController = 0,
  Autopilot = 1,
  Gps = 2,
  Ins = 3,
  LandingRadio = 4,
  SatCom = 5,
}

/// Number of distinct [`ComponentId`] values; bounds arrays indexed by them.
pub const MAX_COMPONENTS: usize = 6;

impl ComponentId {
  pub const ALL: [ComponentId; MAX_COMPONENTS] = [
    ComponentId::FlightController,
    ComponentId::Autopilot,
    ComponentId::Gps,
    ComponentId::Ins,
    ComponentId::LandingRadio,
    ComponentId::SatCom,
  ];

  pub fn index(self) -> usize {
    self as usize
  }

  pub fn from_index(i: usize) -> Option<ComponentId> {
    Self::ALL.get(i).copied()
  }
}

impl std::fmt::Display for ComponentId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      ComponentId::FlightController => "flight_controller",
      ComponentId::Autopilot => "autopilot",
      ComponentId::Gps => "gps",
      ComponentId::Ins => "ins",
      ComponentId::LandingRadio => "landing_radio",
      ComponentId::SatCom => "sat_com",
    };
    f.write_str(name)
  }
}

/// A geodetic position. Latitude/longitude in degrees, altitude in feet.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
  pub latitude: f64,
  pub longitude: f64,
  pub altitude: f64,
}

impl Position {
  pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
    Self {
      latitude,
      longitude,
      altitude,
    }
  }
}

/// The authoritative, fused flight state as seen by consumers of
/// `STATE_RESPONSE` messages.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FlightState {
  pub position: Position,
  /// degrees, `[0, 360)`
  pub heading: f64,
  /// knots
  pub speed: f64,
  /// feet per minute
  pub vertical_speed: f64,
  /// unix seconds
  pub timestamp: u64,
}

/// Seconds since the unix epoch, saturating to zero if the clock is
/// somehow before it.
pub fn unix_timestamp() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_secs())
    .unwrap_or(0)
}
