//! End-to-end scenarios covering source-priority fusion, PID heading
//! wrap, speed saturation, and bus queue-full/pruning behavior, all
//! driven through the crate's public API rather than real forked
//! processes (which the test harness can't observe deterministically).

use std::time::Duration;

use airplane_sim::bus::Bus;
use airplane_sim::common::{ComponentId, Position};
use airplane_sim::flight_state::ExtendedFlightState;
use airplane_sim::messages::{Message, MessageType};
use test_case::test_case;

fn unique_bus_name(tag: &str) -> String {
  format!("/airplane_sim_e2e_{tag}_{}", std::process::id())
}

#[test]
fn single_gps_update_yields_exact_state_response() -> anyhow::Result<()> {
  let name = unique_bus_name("single_gps");
  let bus = Bus::init_named(&name)?;
  bus.subscribe(ComponentId::Autopilot, MessageType::StateResponse)?;

  let gps_position = Position::new(37.6188, -122.3750, 0.0);
  bus.publish(Message::position_update(ComponentId::Gps, gps_position))?;

  // A flight controller stand-in: read the update, fuse it, respond.
  let mut state = ExtendedFlightState::new();
  let update = bus.read_message(ComponentId::FlightController).unwrap();
  if let airplane_sim::messages::MessagePayload::PositionUpdate { position } = update.payload {
    state.update_position(update.header.sender, position);
  }
  bus.publish(Message::state_response(
    ComponentId::FlightController,
    ComponentId::Autopilot,
    state.basic,
  ))?;

  let response = bus.read_message(ComponentId::Autopilot).unwrap();
  match response.payload {
    airplane_sim::messages::MessagePayload::StateResponse { state } => {
      assert_eq!(state.position, gps_position);
    }
    _ => panic!("expected a state response"),
  }

  bus.detach();
  Ok(())
}

#[test]
fn autopilot_command_then_state_request_round_trips_targets() -> anyhow::Result<()> {
  let name = unique_bus_name("command_then_request");
  let bus = Bus::init_named(&name)?;
  bus.subscribe(ComponentId::Autopilot, MessageType::StateResponse)?;

  bus.publish(Message::autopilot_command(
    ComponentId::Autopilot,
    270.0,
    280.0,
    12_000.0,
  ))?;
  bus.publish(Message::state_request(ComponentId::Autopilot))?;

  let mut state = ExtendedFlightState::new();
  while let Some(msg) = bus.read_message(ComponentId::FlightController) {
    match msg.payload {
      airplane_sim::messages::MessagePayload::AutopilotCommand {
        target_heading,
        target_speed,
        target_altitude,
      } => state.update_autopilot(target_altitude, target_heading, target_speed),
      airplane_sim::messages::MessagePayload::StateRequest => {
        bus.publish(Message::state_response(
          ComponentId::FlightController,
          msg.header.sender,
          state.basic,
        ))?;
      }
      _ => {}
    }
  }

  let response = bus.read_message(ComponentId::Autopilot).unwrap();
  match response.payload {
    airplane_sim::messages::MessagePayload::StateResponse { .. } => {}
    _ => panic!("expected a state response"),
  }
  assert_eq!(state.autopilot.target_heading, 270.0);
  assert_eq!(state.autopilot.target_speed, 280.0);
  assert_eq!(state.autopilot.target_altitude, 12_000.0);

  bus.detach();
  Ok(())
}

#[test_case(350.0, 10.0, 3.0 => (353.0, 356.0); "wraps across zero over two ticks")]
fn pid_heading_wrap(current_heading: f64, target_heading: f64, max_rate: f64) -> (f64, f64) {
  use airplane_sim::autopilot::config::{AutopilotConfig, PidGains};
  use airplane_sim::autopilot::pid::PidState;

  let mut config = AutopilotConfig::default();
  config.max_heading_rate = max_rate;
  config.heading_pid = PidGains {
    kp: 1.0,
    ki: 0.0,
    kd: 0.0,
  };

  let mut pid = PidState::default();
  let output1 = pid.tick(
    current_heading,
    0.0,
    0.0,
    target_heading,
    0.0,
    0.0,
    &config,
  );
  let output2 = pid.tick(output1.heading, 0.0, 0.0, target_heading, 0.0, 0.0, &config);
  (
    (output1.heading * 1000.0).round() / 1000.0,
    (output2.heading * 1000.0).round() / 1000.0,
  )
}

#[test]
fn pid_speed_saturates_at_envelope_max() {
  use airplane_sim::autopilot::config::{AutopilotConfig, PidGains};
  use airplane_sim::autopilot::pid::PidState;

  let mut config = AutopilotConfig::default();
  config.min_speed = 120.0;
  config.max_speed = 350.0;
  config.speed_pid = PidGains {
    kp: 0.3,
    ki: 0.0,
    kd: 0.0,
  };

  let mut pid = PidState::default();
  let output = pid.tick(0.0, 0.0, 340.0, 0.0, 0.0, 500.0, &config);
  assert!((output.speed - 350.0).abs() < 1e-9);
}

#[test]
fn queue_full_does_not_overwrite_any_slot() -> anyhow::Result<()> {
  let name = unique_bus_name("queue_full");
  let bus = Bus::init_named(&name)?;

  for _ in 0..airplane_sim::bus::MAX_BUS_MESSAGES {
    bus.publish(Message::state_request(ComponentId::Autopilot))?;
  }
  let overflow = bus.publish(Message::state_request(ComponentId::Autopilot));
  assert!(overflow.is_err());

  bus.subscribe(ComponentId::FlightController, MessageType::StateRequest)?;
  let mut drained = 0;
  while bus.read_message(ComponentId::FlightController).is_some() {
    drained += 1;
  }
  assert_eq!(drained, airplane_sim::bus::MAX_BUS_MESSAGES);

  bus.detach();
  Ok(())
}

#[test]
fn pruning_drops_stale_entries_but_keeps_fresh_one() -> anyhow::Result<()> {
  let name = unique_bus_name("pruning");
  let bus = Bus::init_named(&name)?;

  // Five stale messages: publish them, then sleep past the 5s TTL.
  for _ in 0..5 {
    bus.publish(Message::state_request(ComponentId::Autopilot))?;
  }
  std::thread::sleep(Duration::from_secs(6));

  // A fresh one, published just now.
  bus.publish(Message::state_request(ComponentId::Autopilot))?;

  // Crossing the half-full threshold (need > MAX_BUS_MESSAGES/2 queued to
  // trigger pruning) isn't met by 6 messages at capacity 100; exercise
  // prune_expired's effect directly by filling past the threshold with
  // additional stale-looking requests instead.
  for _ in 0..(airplane_sim::bus::MAX_BUS_MESSAGES / 2) {
    bus.publish(Message::state_request(ComponentId::Autopilot))?;
  }

  bus.subscribe(ComponentId::FlightController, MessageType::StateRequest)?;
  let mut remaining = 0;
  while bus.read_message(ComponentId::FlightController).is_some() {
    remaining += 1;
  }
  // The 5 stale + 1 fresh + the half-capacity fill minus the 5 pruned.
  assert_eq!(remaining, 1 + airplane_sim::bus::MAX_BUS_MESSAGES / 2);

  bus.detach();
  Ok(())
}
