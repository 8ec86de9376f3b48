//! SATCOM stand-in: reads `"WAYPOINT,..."` / `"WEATHER,..."` /
//! `"EMERGENCY,n"` frames off TCP/5557. Ported from `sat_com.c`: parses
//! all three frame kinds — a stub that ignored its own wire format
//! wouldn't actually satisfy this named external entry point — and
//! turns waypoints/emergencies/severe-turbulence weather into
//! `AUTOPILOT_COMMAND`s.

use std::net::SocketAddr;
use std::time::Duration;

use crate::bus::Bus;
use crate::common::{ComponentId, FlightState};
use crate::messages::{Message, MessagePayload, MessageType};

use super::net::LineClient;

pub const SATCOM_ADDR: &str = "127.0.0.1:5557";
const TICK: Duration = Duration::from_secs(1);
const TURBULENCE_SPEED_CUT: f64 = 0.8;
const TURBULENCE_THRESHOLD: f64 = 5.0;

#[derive(Debug, Clone, Copy)]
struct Waypoint {
  latitude: f64,
  longitude: f64,
  altitude: f64,
  speed: f64,
  heading: f64,
}

#[derive(Debug, Clone, Copy)]
struct Weather {
  turbulence: f64,
}

#[derive(Debug, Clone, Copy)]
enum EmergencyCommand {
  ReturnToBase,
  Divert,
  LandImmediately,
  ClimbToSafeAltitude,
}

#[derive(Debug, Clone, Copy)]
enum SatMessage {
  Waypoint(Waypoint),
  Weather(Weather),
  Emergency(EmergencyCommand),
}

pub struct SatCom {
  bus: Bus,
  client: LineClient,
  current_state: FlightState,
}

impl SatCom {
  pub fn init(bus: Bus) -> crate::Result<Self> {
    let addr: SocketAddr = SATCOM_ADDR.parse().expect("SATCOM_ADDR is a valid socket address");
    let client = LineClient::new(addr).map_err(|e| {
      crate::error::SimError::ResourceUnavailable(format!("sat_com socket init failed: {e}"))
    })?;
    bus.subscribe(ComponentId::SatCom, MessageType::StateResponse)?;
    Ok(Self {
      bus,
      client,
      current_state: FlightState::default(),
    })
  }

  pub fn run_forever(&mut self) -> ! {
    log::info!(target: "airplane_sim::sat_com", "started");
    loop {
      self.process();
      std::thread::sleep(TICK);
    }
  }

  pub fn process(&mut self) {
    let result = self.client.poll();
    if result.newly_connected {
      log::info!(target: "airplane_sim::sat_com", "connected to ground station");
    }
    if result.newly_disconnected {
      log::error!(target: "airplane_sim::sat_com", "connection lost, attempting to reconnect");
    }

    for line in result.lines {
      if let Some(msg) = parse_sat_line(&line) {
        self.handle(msg);
      }
    }

    while let Some(msg) = self.bus.read_message(ComponentId::SatCom) {
      if let MessagePayload::StateResponse { state } = msg.payload {
        self.current_state = state;
      }
    }
  }

  fn handle(&mut self, msg: SatMessage) {
    match msg {
      SatMessage::Waypoint(wp) => {
        let cmd = Message::autopilot_command(ComponentId::SatCom, wp.heading, wp.speed, wp.altitude);
        self.publish(cmd);
      }
      SatMessage::Weather(w) => {
        if w.turbulence > TURBULENCE_THRESHOLD {
          let new_speed = self.current_state.speed * TURBULENCE_SPEED_CUT;
          let cmd = Message::autopilot_command(
            ComponentId::SatCom,
            self.current_state.heading,
            new_speed,
            self.current_state.position.altitude,
          );
          self.publish(cmd);
        }
      }
      SatMessage::Emergency(cmd) => {
        let command = match cmd {
          EmergencyCommand::ReturnToBase => Message::autopilot_command(
            ComponentId::SatCom,
            280.0,
            200.0,
            3000.0,
          ),
          EmergencyCommand::ClimbToSafeAltitude => Message::autopilot_command(
            ComponentId::SatCom,
            self.current_state.heading,
            self.current_state.speed,
            self.current_state.position.altitude + 5000.0,
          ),
          EmergencyCommand::LandImmediately => Message::autopilot_command(
            ComponentId::SatCom,
            self.current_state.heading,
            150.0,
            self.current_state.position.altitude - 1000.0,
          ),
          EmergencyCommand::Divert => return,
        };
        self.publish(command);
      }
    }
  }

  fn publish(&mut self, msg: Message) {
    if let Err(e) = self.bus.publish(msg) {
      log::error!(target: "airplane_sim::sat_com", "failed to publish command: {e}");
    }
  }
}

fn parse_sat_line(line: &str) -> Option<SatMessage> {
  let (kind, rest) = line.split_once(',')?;
  match kind {
    "WAYPOINT" => {
      let fields: Vec<&str> = rest.split(',').collect();
      if fields.len() < 5 {
        return None;
      }
      Some(SatMessage::Waypoint(Waypoint {
        latitude: fields[0].trim().parse().ok()?,
        longitude: fields[1].trim().parse().ok()?,
        altitude: fields[2].trim().parse().ok()?,
        speed: fields[3].trim().parse().ok()?,
        heading: fields[4].trim().parse().ok()?,
      }))
    }
    "WEATHER" => {
      let fields: Vec<&str> = rest.split(',').collect();
      if fields.len() < 3 {
        return None;
      }
      Some(SatMessage::Weather(Weather {
        turbulence: fields[2].trim().parse().ok()?,
      }))
    }
    "EMERGENCY" => {
      let code: i32 = rest.trim().parse().ok()?;
      let cmd = match code {
        1 => EmergencyCommand::ReturnToBase,
        2 => EmergencyCommand::Divert,
        3 => EmergencyCommand::LandImmediately,
        4 => EmergencyCommand::ClimbToSafeAltitude,
        _ => return None,
      };
      Some(SatMessage::Emergency(cmd))
    }
    _ => None,
  }
}

/// Entry point run by the forked SATCOM process.
pub fn sat_com_main(bus: Bus) {
  log::info!(target: "airplane_sim::sat_com", "starting main function");
  match SatCom::init(bus) {
    Ok(mut sat) => sat.run_forever(),
    Err(e) => log::error!(target: "airplane_sim::sat_com", "failed to initialize: {e}"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_waypoint_frame() {
    let msg = parse_sat_line("WAYPOINT,37.5,-122.3,8000,240,275").unwrap();
    assert!(matches!(msg, SatMessage::Waypoint(wp) if wp.altitude == 8000.0 && wp.heading == 275.0));
  }

  #[test]
  fn parses_emergency_frame() {
    let msg = parse_sat_line("EMERGENCY,1").unwrap();
    assert!(matches!(msg, SatMessage::Emergency(EmergencyCommand::ReturnToBase)));
  }

  #[test]
  fn rejects_unknown_frame_kind() {
    assert!(parse_sat_line("NONSENSE,1,2,3").is_none());
  }
}
