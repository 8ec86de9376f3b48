//! The flight controller's owned, fused state. Exactly one writer — the
//! supervisor's message loop — mutates this; every other component only
//! ever sees it through a `STATE_RESPONSE` copy.

use crate::common::{ComponentId, FlightState, Position};

/// A single navigation source's last reported position, with validity
/// tracked independently of the fused `basic.position` it feeds.
#[derive(Debug, Clone, Copy, Default)]
struct NavSlot {
  valid: bool,
  position: Position,
}

#[derive(Debug, Clone, Copy, Default)]
struct NavData {
  gps: NavSlot,
  ins: NavSlot,
  radio: NavSlot,
}

/// Reserved aircraft parameters, not driven by the autopilot loop.
/// Carried so `update_parameters` has somewhere to write, matching the
/// original's forward-compatible field set; nothing in this crate
/// calls it yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct Parameters {
  /// degrees, -90..=90
  pub pitch: f64,
  /// degrees, -180..=180
  pub roll: f64,
  /// degrees, 0..360
  pub yaw: f64,
  /// percent, 0..=100
  pub thrust: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AutopilotTargets {
  pub enabled: bool,
  pub target_altitude: f64,
  pub target_heading: f64,
  pub target_speed: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemStatus {
  pub gps_connected: bool,
  pub ins_operational: bool,
  pub landing_radio_connected: bool,
  pub sat_com_connected: bool,
  /// unix seconds of the last update to any part of the flight state.
  pub last_update_time: u64,
}

/// The supervisor's fused view of the aircraft, owned and mutated
/// exclusively by the flight controller's message loop — exactly one
/// writer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtendedFlightState {
  pub basic: FlightState,
  nav_data: NavData,
  pub parameters: Parameters,
  pub autopilot: AutopilotTargets,
  pub system_status: SystemStatus,
}

impl ExtendedFlightState {
  pub fn new() -> Self {
    let now = crate::common::unix_timestamp();
    Self {
      basic: FlightState {
        timestamp: now,
        ..Default::default()
      },
      system_status: SystemStatus {
        last_update_time: now,
        ..Default::default()
      },
      ..Default::default()
    }
  }

  /// Record a `POSITION_UPDATE` from `source` and recompute the fused
  /// position. Non-navigation sources are ignored.
  pub fn update_position(&mut self, source: ComponentId, position: Position) {
    let slot = match source {
      ComponentId::Gps => &mut self.nav_data.gps,
      ComponentId::Ins => &mut self.nav_data.ins,
      ComponentId::LandingRadio => &mut self.nav_data.radio,
      _ => return,
    };
    slot.valid = true;
    slot.position = position;

    self.touch();
    self.basic.position = self.best_position();
  }

  /// Write the reserved parameter fields (never called by the autopilot
  /// loop itself; kept for parity with the original's entry point).
  pub fn update_parameters(&mut self, pitch: f64, roll: f64, yaw: f64, thrust: f64) {
    self.parameters = Parameters {
      pitch,
      roll,
      yaw,
      thrust,
    };
    self.touch();
  }

  /// Copy an `AUTOPILOT_COMMAND`'s three targets in.
  pub fn update_autopilot(&mut self, target_altitude: f64, target_heading: f64, target_speed: f64) {
    self.autopilot.target_altitude = target_altitude;
    self.autopilot.target_heading = target_heading;
    self.autopilot.target_speed = target_speed;
    self.touch();
  }

  /// Apply a `SYSTEM_STATUS` update: set the connected/operational flag,
  /// invalidate the matching nav slot when going down, and recompute the
  /// fused position either way.
  pub fn update_system_status(&mut self, component: ComponentId, connected: bool) {
    match component {
      ComponentId::Gps => {
        self.system_status.gps_connected = connected;
        if !connected {
          self.nav_data.gps.valid = false;
        }
      }
      ComponentId::Ins => {
        self.system_status.ins_operational = connected;
        if !connected {
          self.nav_data.ins.valid = false;
        }
      }
      ComponentId::LandingRadio => {
        self.system_status.landing_radio_connected = connected;
        if !connected {
          self.nav_data.radio.valid = false;
        }
      }
      ComponentId::SatCom => {
        self.system_status.sat_com_connected = connected;
      }
      ComponentId::FlightController | ComponentId::Autopilot => return,
    }

    self.touch();
    self.basic.position = self.best_position();
  }

  /// Priority: GPS > INS > radio; unchanged if none valid.
  pub fn best_position(&self) -> Position {
    if self.nav_data.gps.valid {
      self.nav_data.gps.position
    } else if self.nav_data.ins.valid {
      self.nav_data.ins.position
    } else if self.nav_data.radio.valid {
      self.nav_data.radio.position
    } else {
      self.basic.position
    }
  }

  /// True once at least one nav source is valid and the state has been
  /// touched within the last 10 seconds. Independent of per-slot validity
  /// alone — a state with a valid slot but no update in 10s is still
  /// considered stale.
  pub fn is_stale(&self) -> bool {
    let has_source =
      self.nav_data.gps.valid || self.nav_data.ins.valid || self.nav_data.radio.valid;
    if !has_source {
      return true;
    }
    crate::common::unix_timestamp().saturating_sub(self.system_status.last_update_time) > 10
  }

  fn touch(&mut self) {
    let now = crate::common::unix_timestamp();
    self.basic.timestamp = now;
    self.system_status.last_update_time = now;
  }
}

impl std::fmt::Display for ExtendedFlightState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let pos = self.basic.position;
    writeln!(f, "Flight State:")?;
    writeln!(
      f,
      "Position: {:.6}, {:.6}, {:.1}",
      pos.latitude, pos.longitude, pos.altitude
    )?;
    writeln!(
      f,
      "Heading: {:.1}°, Speed: {:.1} kts, VS: {:.1} fpm",
      self.basic.heading, self.basic.speed, self.basic.vertical_speed
    )?;
    writeln!(
      f,
      "Parameters - Pitch: {:.1}°, Roll: {:.1}°, Yaw: {:.1}°, Thrust: {:.1}%",
      self.parameters.pitch, self.parameters.roll, self.parameters.yaw, self.parameters.thrust
    )?;
    writeln!(
      f,
      "Autopilot - {}, Target Alt: {:.1}, Hdg: {:.1}°, Spd: {:.1}",
      if self.autopilot.enabled { "ON" } else { "OFF" },
      self.autopilot.target_altitude,
      self.autopilot.target_heading,
      self.autopilot.target_speed
    )?;
    write!(
      f,
      "Systems - GPS: {}, INS: {}, Radio: {}, SatCom: {}",
      if self.system_status.gps_connected {
        "OK"
      } else {
        "DISC"
      },
      if self.system_status.ins_operational {
        "OK"
      } else {
        "FAIL"
      },
      if self.system_status.landing_radio_connected {
        "OK"
      } else {
        "DISC"
      },
      if self.system_status.sat_com_connected {
        "OK"
      } else {
        "DISC"
      }
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn best_position_prefers_gps_then_ins_then_radio() {
    let mut state = ExtendedFlightState::new();
    let gps = Position::new(1.0, 1.0, 100.0);
    let ins = Position::new(2.0, 2.0, 200.0);
    let radio = Position::new(3.0, 3.0, 300.0);

    state.update_position(ComponentId::Gps, gps);
    state.update_position(ComponentId::Ins, ins);
    state.update_position(ComponentId::LandingRadio, radio);
    assert_eq!(state.basic.position, gps);

    state.update_system_status(ComponentId::Gps, false);
    assert_eq!(state.basic.position, ins);

    state.update_system_status(ComponentId::Ins, false);
    assert_eq!(state.basic.position, radio);
  }

  #[test]
  fn best_position_unchanged_when_no_slot_valid() {
    let mut state = ExtendedFlightState::new();
    let gps = Position::new(9.0, 9.0, 900.0);
    state.update_position(ComponentId::Gps, gps);
    state.update_system_status(ComponentId::Gps, false);
    assert_eq!(state.basic.position, gps);
  }

  #[test]
  fn is_stale_with_no_source() {
    let state = ExtendedFlightState::new();
    assert!(state.is_stale());
  }

  #[test]
  fn is_stale_false_right_after_update() {
    let mut state = ExtendedFlightState::new();
    state.update_position(ComponentId::Gps, Position::default());
    assert!(!state.is_stale());
  }
}
