//! The autopilot process: periodically requests state, drains responses,
//! and runs the three PID loops to publish new `AUTOPILOT_COMMAND`
//! targets.

pub mod config;
pub mod pid;

use std::path::Path;
use std::time::Duration;

use crate::bus::Bus;
use crate::common::{ComponentId, FlightState};
use crate::messages::{Message, MessagePayload, MessageType};

use config::AutopilotConfig;
use pid::PidState;

/// 10 Hz tick rate.
pub const UPDATE_INTERVAL: Duration = Duration::from_millis(100);
/// Request state no more often than once per second.
pub const STATE_REQUEST_INTERVAL_S: u64 = 1;

const CONFIG_FILE: &str = "config/autopilot_config.json";

/// Everything the original kept as process-global statics (last request
/// timestamp, PID state) lives here as instance fields instead.
pub struct Autopilot {
  bus: Bus,
  config: AutopilotConfig,
  current_state: FlightState,
  state_valid: bool,
  last_state_request: u64,
  pid: PidState,
}

impl Autopilot {
  pub fn init(bus: Bus) -> crate::Result<Self> {
    log::info!(target: "airplane_sim::autopilot", "starting initialization");

    let config = AutopilotConfig::load(Path::new(CONFIG_FILE));
    log::info!(
      target: "airplane_sim::autopilot",
      "loaded config - target: {:.6},{:.6} @ {:.0} ft, hdg: {:.1}°, spd: {:.0} kts",
      config.target_latitude, config.target_longitude,
      config.target_altitude, config.target_heading, config.target_speed
    );

    bus.subscribe(ComponentId::Autopilot, MessageType::StateResponse)?;

    log::info!(target: "airplane_sim::autopilot", "initialization complete");
    Ok(Self {
      bus,
      config,
      current_state: FlightState::default(),
      state_valid: false,
      last_state_request: 0,
      pid: PidState::default(),
    })
  }

  /// Run forever at [`UPDATE_INTERVAL`], until the process is terminated.
  pub fn run_forever(&mut self) -> ! {
    log::info!(target: "airplane_sim::autopilot", "entering main loop");
    loop {
      self.process();
      std::thread::sleep(UPDATE_INTERVAL);
    }
  }

  /// One tick: maybe request state, drain inbound messages, maybe run
  /// the PID loops.
  pub fn process(&mut self) {
    let now = crate::common::unix_timestamp();
    if now.saturating_sub(self.last_state_request) >= STATE_REQUEST_INTERVAL_S {
      self.request_state();
    }

    while let Some(msg) = self.bus.read_message(ComponentId::Autopilot) {
      if let MessagePayload::StateResponse { state } = msg.payload {
        self.current_state = state;
        self.state_valid = true;
        log::debug!(
          target: "airplane_sim::autopilot",
          "state updated - pos: {:.6},{:.6} @ {:.0} ft, hdg: {:.1}°, spd: {:.1} kts",
          state.position.latitude, state.position.longitude,
          state.position.altitude, state.heading, state.speed
        );
      }
    }

    if self.state_valid {
      self.update_pid_controls();
    } else {
      log::warn!(target: "airplane_sim::autopilot", "skipping control update - no valid state");
    }
  }

  fn request_state(&mut self) {
    let msg = Message::state_request(ComponentId::Autopilot);
    match self.bus.publish(msg) {
      Ok(()) => log::debug!(target: "airplane_sim::autopilot", "requested state update"),
      Err(e) => log::error!(target: "airplane_sim::autopilot", "failed to publish state request: {e}"),
    }
    self.last_state_request = crate::common::unix_timestamp();
  }

  fn update_pid_controls(&mut self) {
    let output = self.pid.tick(
      self.current_state.heading,
      self.current_state.position.altitude,
      self.current_state.speed,
      self.config.target_heading,
      self.config.target_altitude,
      self.config.target_speed,
      &self.config,
    );

    log::debug!(
      target: "airplane_sim::autopilot",
      "commanding hdg: {:.1}°, spd: {:.1} kts, alt: {:.0} ft",
      output.heading, output.speed, output.altitude
    );

    let msg = Message::autopilot_command(
      ComponentId::Autopilot,
      output.heading,
      output.speed,
      output.altitude,
    );
    if let Err(e) = self.bus.publish(msg) {
      log::error!(target: "airplane_sim::autopilot", "failed to publish control command: {e}");
    }
  }
}

/// Entry point run by the forked autopilot process after it attaches to
/// the bus.
pub fn autopilot_main(bus: Bus) {
  log::info!(target: "airplane_sim::autopilot", "starting main function");
  match Autopilot::init(bus) {
    Ok(mut autopilot) => autopilot.run_forever(),
    Err(e) => log::error!(target: "airplane_sim::autopilot", "failed to initialize: {e}"),
  }
}
