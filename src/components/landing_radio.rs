//! Landing radio (ILS) stand-in: reads
//! `"<loc>,<gs>,<dist>,<loc_valid>,<gs_valid>,<marker>\n"` frames off
//! TCP/5556 at ~10 Hz. Ported from `landing_radio.c`, including
//! `ils_deviations_to_position`'s localizer/glideslope geometry and its
//! known rough edge: when either signal is invalid, the unmoved runway
//! threshold is published rather than suppressing the publish —
//! preserved here, not fixed.

use std::net::SocketAddr;
use std::time::Duration;

use crate::bus::Bus;
use crate::common::{ComponentId, Position};
use crate::messages::Message;

use super::net::LineClient;

pub const LANDING_RADIO_ADDR: &str = "127.0.0.1:5556";
const STATUS_INTERVAL_S: u64 = 1;
const TICK: Duration = Duration::from_millis(100);

/// Standard 3-degree glide slope.
const GLIDE_SLOPE_ANGLE_DEG: f64 = 3.0;
/// SFO runway 28L heading.
const RUNWAY_HEADING_DEG: f64 = 280.0;

/// SFO runway 28L threshold.
const RUNWAY_THRESHOLD: Position = Position {
  latitude: 37.6161,
  longitude: -122.3569,
  altitude: 13.0,
};

#[derive(Debug, Clone, Copy, Default)]
struct IlsData {
  localizer: f64,
  glideslope: f64,
  distance_nm: f64,
  localizer_valid: bool,
  glideslope_valid: bool,
  #[allow(dead_code)]
  marker_beacon: bool,
}

pub struct LandingRadio {
  bus: Bus,
  client: LineClient,
  last_status_update: u64,
}

impl LandingRadio {
  pub fn init(bus: Bus) -> std::io::Result<Self> {
    log::info!(target: "airplane_sim::landing_radio", "starting initialization");
    let addr: SocketAddr = LANDING_RADIO_ADDR
      .parse()
      .expect("LANDING_RADIO_ADDR is a valid socket address");
    let client = LineClient::new(addr)?;
    log::info!(target: "airplane_sim::landing_radio", "initialization complete");
    Ok(Self {
      bus,
      client,
      last_status_update: 0,
    })
  }

  pub fn run_forever(&mut self) -> ! {
    log::info!(target: "airplane_sim::landing_radio", "entering main loop");
    loop {
      self.process();
      std::thread::sleep(TICK);
    }
  }

  pub fn process(&mut self) {
    let now = crate::common::unix_timestamp();
    if now.saturating_sub(self.last_status_update) >= STATUS_INTERVAL_S {
      self.send_status(self.client.is_connected());
      self.last_status_update = now;
    }

    let result = self.client.poll();
    if result.newly_connected {
      log::info!(target: "airplane_sim::landing_radio", "connected to sender");
      self.send_status(true);
    }
    if result.newly_disconnected {
      log::error!(target: "airplane_sim::landing_radio", "connection lost");
      self.send_status(false);
    }

    for line in result.lines {
      match parse_ils_line(&line) {
        Some(ils) => {
          let pos = ils_deviations_to_position(&ils, &RUNWAY_THRESHOLD);
          self.publish_position(pos);
        }
        None => log::error!(target: "airplane_sim::landing_radio", "failed to parse ILS data: {line}"),
      }
    }
  }

  fn publish_position(&mut self, pos: Position) {
    match self
      .bus
      .publish(Message::position_update(ComponentId::LandingRadio, pos))
    {
      Ok(()) => log::debug!(
        target: "airplane_sim::landing_radio",
        "published position: {:.6}, {:.6}, {:.1}", pos.latitude, pos.longitude, pos.altitude
      ),
      Err(e) => log::error!(target: "airplane_sim::landing_radio", "failed to publish position: {e}"),
    }
  }

  fn send_status(&mut self, connected: bool) {
    let msg = Message::system_status(ComponentId::LandingRadio, connected);
    if let Err(e) = self.bus.publish(msg) {
      log::error!(target: "airplane_sim::landing_radio", "failed to publish status update: {e}");
    }
  }
}

fn parse_ils_line(line: &str) -> Option<IlsData> {
  let parts: Vec<&str> = line.split(',').collect();
  if parts.len() != 6 {
    return None;
  }
  Some(IlsData {
    localizer: parts[0].trim().parse().ok()?,
    glideslope: parts[1].trim().parse().ok()?,
    distance_nm: parts[2].trim().parse().ok()?,
    localizer_valid: parts[3].trim() != "0",
    glideslope_valid: parts[4].trim() != "0",
    marker_beacon: parts[5].trim() != "0",
  })
}

/// Convert ILS localizer/glideslope deviations into an absolute position
/// relative to `runway_threshold`. When either signal is invalid, returns
/// `runway_threshold` unchanged rather than suppressing the publish —
/// an open question inherited from the original, preserved as-is.
fn ils_deviations_to_position(ils: &IlsData, runway_threshold: &Position) -> Position {
  if !ils.localizer_valid || !ils.glideslope_valid {
    log::warn!(
      target: "airplane_sim::landing_radio",
      "invalid ILS data - LOC valid: {}, GS valid: {}", ils.localizer_valid, ils.glideslope_valid
    );
    return *runway_threshold;
  }

  let distance_m = ils.distance_nm * 1852.0;
  let runway_heading_rad = RUNWAY_HEADING_DEG.to_radians();
  let localizer_rad = ils.localizer.to_radians();
  let total_angle_rad = runway_heading_rad + localizer_rad;

  let x = distance_m * total_angle_rad.cos();
  let y = distance_m * total_angle_rad.sin();

  let lat_change = y / 111_111.0;
  let lon_change = x / (111_111.0 * runway_threshold.latitude.to_radians().cos());

  let glideslope_rad = GLIDE_SLOPE_ANGLE_DEG.to_radians();
  let nominal_altitude = runway_threshold.altitude + distance_m * glideslope_rad.tan();
  let glideslope_deviation_rad = ils.glideslope.to_radians();
  let altitude = nominal_altitude + distance_m * glideslope_deviation_rad.tan();

  Position::new(
    runway_threshold.latitude + lat_change,
    runway_threshold.longitude + lon_change,
    altitude,
  )
}

/// Entry point run by the forked landing-radio process.
pub fn landing_radio_main(bus: Bus) {
  log::info!(target: "airplane_sim::landing_radio", "starting main function");
  match LandingRadio::init(bus) {
    Ok(mut radio) => radio.run_forever(),
    Err(e) => log::error!(target: "airplane_sim::landing_radio", "failed to initialize: {e}"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn invalid_signals_yield_unmoved_threshold() {
    let ils = IlsData {
      localizer: 1.0,
      glideslope: 0.5,
      distance_nm: 5.0,
      localizer_valid: false,
      glideslope_valid: true,
      marker_beacon: false,
    };
    let pos = ils_deviations_to_position(&ils, &RUNWAY_THRESHOLD);
    assert_eq!(pos, RUNWAY_THRESHOLD);
  }

  #[test]
  fn on_centerline_and_glideslope_stays_near_runway_heading_line() {
    let ils = IlsData {
      localizer: 0.0,
      glideslope: 0.0,
      distance_nm: 1.0,
      localizer_valid: true,
      glideslope_valid: true,
      marker_beacon: true,
    };
    let pos = ils_deviations_to_position(&ils, &RUNWAY_THRESHOLD);
    assert!(pos.altitude > RUNWAY_THRESHOLD.altitude);
    assert_ne!(pos.latitude, RUNWAY_THRESHOLD.latitude);
  }

  #[test]
  fn parses_six_field_line() {
    let ils = parse_ils_line("1.5,-0.3,4.2,1,1,0").unwrap();
    assert_eq!(ils.localizer, 1.5);
    assert!(ils.localizer_valid);
    assert!(!ils.marker_beacon);
  }
}
