//! GPS receiver stand-in: reads `"<lat>,<lon>,<alt>\n"` frames off
//! TCP/5555 at ~1 Hz. Ported from `gps_receiver.c`: connect with
//! backoff, parse each frame, run its sanity checks (`validate_gps_data`
//! — range check rejects, jump/frozen checks only log), and publish
//! `POSITION_UPDATE` / periodic `SYSTEM_STATUS`.

use std::net::SocketAddr;
use std::time::Duration;

use crate::bus::Bus;
use crate::common::{ComponentId, Position};
use crate::messages::Message;

use super::net::LineClient;

pub const GPS_ADDR: &str = "127.0.0.1:5555";
const STATUS_INTERVAL_S: u64 = 1;
const TICK: Duration = Duration::from_millis(10);
/// Above this many consecutive unparseable frames, force a reconnect
/// (original: `invalid_count > 10`).
const MAX_INVALID_STREAK: u32 = 10;
/// Degrees of lat/lon change per second considered plausible for an
/// aircraft (~0.6°/s, matching the original's generous 600kt bound).
const MAX_DEGREE_CHANGE_PER_SEC: f64 = 0.6 / 111.0;
const MAX_ALT_CHANGE_FT: f64 = 2000.0;
const FROZEN_POSITION_STREAK_WARN: u32 = 10;

pub struct Gps {
  bus: Bus,
  client: LineClient,
  last_position: Position,
  last_status_update: u64,
  invalid_streak: u32,
  frozen_streak: u32,
}

impl Gps {
  pub fn init(bus: Bus) -> std::io::Result<Self> {
    log::info!(target: "airplane_sim::gps", "starting initialization");
    let addr: SocketAddr = GPS_ADDR.parse().expect("GPS_ADDR is a valid socket address");
    let client = LineClient::new(addr)?;
    log::info!(target: "airplane_sim::gps", "initialization complete");
    Ok(Self {
      bus,
      client,
      last_position: Position::default(),
      last_status_update: 0,
      invalid_streak: 0,
      frozen_streak: 0,
    })
  }

  pub fn run_forever(&mut self) -> ! {
    log::info!(target: "airplane_sim::gps", "entering main loop");
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
      log::info!(target: "airplane_sim::gps", "connected to GPS sender");
      self.send_status(true);
    }
    if result.newly_disconnected {
      log::error!(target: "airplane_sim::gps", "connection lost");
      self.send_status(false);
    }

    for line in result.lines {
      match parse_gps_line(&line) {
        Some(pos) if self.validate(&pos) => {
          self.invalid_streak = 0;
          self.publish_position(pos);
        }
        Some(_) => {
          self.invalid_streak += 1;
          if self.invalid_streak > MAX_INVALID_STREAK {
            log::error!(target: "airplane_sim::gps", "too many invalid GPS readings, reconnecting");
            self.invalid_streak = 0;
          }
        }
        None => {
          log::error!(target: "airplane_sim::gps", "failed to parse GPS data: {line}");
          self.invalid_streak += 1;
          if self.invalid_streak > MAX_INVALID_STREAK {
            log::error!(target: "airplane_sim::gps", "too many invalid GPS readings, reconnecting");
            self.invalid_streak = 0;
          }
        }
      }
    }
  }

  /// Range check rejects the position (returns `false`) without
  /// updating the jump/frozen streaks, matching `validate_gps_data`'s
  /// short-circuit. The implausible-jump and frozen-position checks
  /// only run on positions that pass the range check, and only log —
  /// neither one refuses the position.
  fn validate(&mut self, pos: &Position) -> bool {
    if !(-90.0..=90.0).contains(&pos.latitude)
      || !(-180.0..=180.0).contains(&pos.longitude)
      || pos.altitude < -1000.0
    {
      log::warn!(
        target: "airplane_sim::gps",
        "invalid GPS coordinates: {:.6}, {:.6}, {:.1}",
        pos.latitude, pos.longitude, pos.altitude
      );
      return false;
    }

    if self.last_position.latitude != 0.0 || self.last_position.longitude != 0.0 {
      let lat_change = (pos.latitude - self.last_position.latitude).abs();
      let lon_change = (pos.longitude - self.last_position.longitude).abs();
      let alt_change = (pos.altitude - self.last_position.altitude).abs();
      if lat_change > MAX_DEGREE_CHANGE_PER_SEC
        || lon_change > MAX_DEGREE_CHANGE_PER_SEC
        || alt_change > MAX_ALT_CHANGE_FT
      {
        log::warn!(
          target: "airplane_sim::gps",
          "large position change detected - delta lat: {lat_change:.6}, delta lon: {lon_change:.6}, delta alt: {alt_change:.1}"
        );
      }
    }

    if pos.latitude == self.last_position.latitude && pos.longitude == self.last_position.longitude
    {
      self.frozen_streak += 1;
      if self.frozen_streak > FROZEN_POSITION_STREAK_WARN {
        log::warn!(
          target: "airplane_sim::gps",
          "position appears frozen at {:.6}, {:.6}", pos.latitude, pos.longitude
        );
      }
    } else {
      self.frozen_streak = 0;
    }

    true
  }

  fn publish_position(&mut self, pos: Position) {
    match self.bus.publish(Message::position_update(ComponentId::Gps, pos)) {
      Ok(()) => {
        self.last_position = pos;
        log::debug!(
          target: "airplane_sim::gps",
          "published position: {:.6}, {:.6}, {:.1}", pos.latitude, pos.longitude, pos.altitude
        );
      }
      Err(e) => log::error!(target: "airplane_sim::gps", "failed to publish position: {e}"),
    }
  }

  fn send_status(&mut self, connected: bool) {
    let msg = Message::system_status(ComponentId::Gps, connected);
    if let Err(e) = self.bus.publish(msg) {
      log::error!(target: "airplane_sim::gps", "failed to publish status update: {e}");
    }
  }
}

fn parse_gps_line(line: &str) -> Option<Position> {
  let mut parts = line.splitn(3, ',');
  let lat: f64 = parts.next()?.trim().parse().ok()?;
  let lon: f64 = parts.next()?.trim().parse().ok()?;
  let alt: f64 = parts.next()?.trim().parse().ok()?;
  Some(Position::new(lat, lon, alt))
}

/// Entry point run by the forked GPS process.
pub fn gps_main(bus: Bus) {
  log::info!(target: "airplane_sim::gps", "starting main function");
  match Gps::init(bus) {
    Ok(mut gps) => gps.run_forever(),
    Err(e) => log::error!(target: "airplane_sim::gps", "failed to initialize: {e}"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_well_formed_line() {
    let pos = parse_gps_line("37.6188,-122.3750,0.0").unwrap();
    assert_eq!(pos, Position::new(37.6188, -122.3750, 0.0));
  }

  #[test]
  fn rejects_malformed_line() {
    assert!(parse_gps_line("not,a,position").is_none());
    assert!(parse_gps_line("37.6188,-122.3750").is_none());
  }

  fn test_gps() -> Gps {
    let bus = Bus::init_named(&format!("/airplane_sim_gps_test_{}", std::process::id()))
      .expect("shared bus segment for test");
    let client = LineClient::new(GPS_ADDR.parse().unwrap()).expect("non-connecting line client");
    Gps {
      bus,
      client,
      last_position: Position::default(),
      last_status_update: 0,
      invalid_streak: 0,
      frozen_streak: 0,
    }
  }

  #[test]
  fn validate_rejects_out_of_range_position() {
    let mut gps = test_gps();
    assert!(!gps.validate(&Position::new(999.0, 0.0, 0.0)));
    gps.bus.detach();
  }

  #[test]
  fn validate_accepts_in_range_position() {
    let mut gps = test_gps();
    assert!(gps.validate(&Position::new(37.6, -122.4, 500.0)));
    gps.bus.detach();
  }
}
