//! INS stand-in. The inertial-navigation sensor itself is external to
//! this simulator — only the *position messages* it injects onto the
//! bus matter here. The original runs a full inertial-navigation error
//! model (accelerometer/gyro/magnetometer noise, bias drift, dead
//! reckoning); none of that is load-bearing, so this reproduces only
//! its externally visible behavior: request the fused state
//! periodically, derive a position near it with small pseudo-random
//! drift, and publish `POSITION_UPDATE` / `SYSTEM_STATUS` at the same
//! ~100 Hz cadence.

use std::time::Duration;

use crate::bus::Bus;
use crate::common::{ComponentId, FlightState, Position};
use crate::messages::{Message, MessagePayload, MessageType};

const TICK: Duration = Duration::from_millis(10);
const STATE_REQUEST_INTERVAL_S: u64 = 1;
const STATUS_INTERVAL_S: u64 = 1;
/// Degrees of simulated drift noise per update, chosen small enough that
/// INS positions stay plausible relative to the fused state it drifts
/// from.
const POSITION_NOISE_DEG: f64 = 0.00002;
const ALTITUDE_NOISE_FT: f64 = 2.0;

pub struct Ins {
  bus: Bus,
  last_known: FlightState,
  have_state: bool,
  last_state_request: u64,
  last_status_update: u64,
  rng_state: u64,
}

impl Ins {
  pub fn init(bus: Bus) -> crate::Result<Self> {
    log::info!(target: "airplane_sim::ins", "starting initialization");
    bus.subscribe(ComponentId::Ins, MessageType::StateResponse)?;
    log::info!(target: "airplane_sim::ins", "initialization complete");
    Ok(Self {
      bus,
      last_known: FlightState::default(),
      have_state: false,
      last_state_request: 0,
      last_status_update: 0,
      rng_state: 0x9E3779B97F4A7C15,
    })
  }

  pub fn run_forever(&mut self) -> ! {
    log::info!(target: "airplane_sim::ins", "entering main loop");
    loop {
      self.process();
      std::thread::sleep(TICK);
    }
  }

  pub fn process(&mut self) {
    let now = crate::common::unix_timestamp();

    if now.saturating_sub(self.last_status_update) >= STATUS_INTERVAL_S {
      self.send_status(true);
      self.last_status_update = now;
    }

    if now.saturating_sub(self.last_state_request) >= STATE_REQUEST_INTERVAL_S {
      if let Err(e) = self.bus.publish(Message::state_request(ComponentId::Ins)) {
        log::error!(target: "airplane_sim::ins", "failed to publish state request: {e}");
      }
      self.last_state_request = now;
    }

    while let Some(msg) = self.bus.read_message(ComponentId::Ins) {
      if let MessagePayload::StateResponse { state } = msg.payload {
        self.last_known = state;
        self.have_state = true;
      }
    }

    if self.have_state {
      let drifted = self.drift(self.last_known.position);
      if let Err(e) = self
        .bus
        .publish(Message::position_update(ComponentId::Ins, drifted))
      {
        log::error!(target: "airplane_sim::ins", "failed to publish position: {e}");
      }
    }
  }

  /// Apply small pseudo-random drift to `base`, standing in for the
  /// original's sensor-noise-driven dead reckoning.
  fn drift(&mut self, base: Position) -> Position {
    Position::new(
      base.latitude + self.noise() * POSITION_NOISE_DEG,
      base.longitude + self.noise() * POSITION_NOISE_DEG,
      base.altitude + self.noise() * ALTITUDE_NOISE_FT,
    )
  }

  /// A small xorshift PRNG mapped into roughly `[-1, 1]`. Deterministic
  /// given a fixed seed, which keeps INS drift reproducible across test
  /// runs rather than reaching for a true noise distribution.
  fn noise(&mut self) -> f64 {
    let mut x = self.rng_state;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    self.rng_state = x;
    ((x >> 11) as f64 / (1u64 << 53) as f64) * 2.0 - 1.0
  }

  fn send_status(&mut self, operational: bool) {
    let msg = Message::system_status(ComponentId::Ins, operational);
    if let Err(e) = self.bus.publish(msg) {
      log::error!(target: "airplane_sim::ins", "failed to publish status update: {e}");
    }
  }
}

/// Entry point run by the forked INS process.
pub fn ins_main(bus: Bus) {
  log::info!(target: "airplane_sim::ins", "starting main function");
  match Ins::init(bus) {
    Ok(mut ins) => ins.run_forever(),
    Err(e) => log::error!(target: "airplane_sim::ins", "failed to initialize: {e}"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn noise_stays_bounded() {
    let mut rng: u64 = 0x1234;
    for _ in 0..1000 {
      rng ^= rng << 13;
      rng ^= rng >> 7;
      rng ^= rng << 17;
      let v = ((rng >> 11) as f64 / (1u64 << 53) as f64) * 2.0 - 1.0;
      assert!((-1.0..=1.0).contains(&v));
    }
  }
}
