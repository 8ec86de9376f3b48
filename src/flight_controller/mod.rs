//! The supervisor process: forks the component processes, owns the
//! fused `ExtendedFlightState`, answers state queries, routes autopilot
//! commands, and restarts crashed children. Ported from
//! `flight_controller.c`.

use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};

use crate::bus::Bus;
use crate::common::ComponentId;
use crate::components::{gps_main, ins_main, landing_radio_main, sat_com_main};
use crate::flight_state::ExtendedFlightState;
use crate::messages::{Message, MessagePayload, MessageType};

/// Components spawned at start-up, in this order, with a 100ms gap
/// between each. SATCOM isn't one of the core sensor feeds but is
/// included here since the supervisor can supervise it the same way as
/// the rest.
const START_ORDER: [ComponentId; 5] = [
  ComponentId::Autopilot,
  ComponentId::Gps,
  ComponentId::Ins,
  ComponentId::LandingRadio,
  ComponentId::SatCom,
];

const SPAWN_GAP: Duration = Duration::from_millis(100);
const GRACEFUL_SHUTDOWN_WAIT: Duration = Duration::from_millis(100);

pub struct FlightController {
  bus: Bus,
  state: ExtendedFlightState,
  component_pids: [Option<Pid>; crate::common::MAX_COMPONENTS],
  running: bool,
}

impl FlightController {
  /// Subscribe to the four message types the supervisor handles. The
  /// bus itself is initialized by the caller before this runs.
  pub fn init(bus: Bus) -> crate::Result<Self> {
    bus.subscribe(ComponentId::FlightController, MessageType::PositionUpdate)?;
    bus.subscribe(ComponentId::FlightController, MessageType::StateRequest)?;
    bus.subscribe(ComponentId::FlightController, MessageType::AutopilotCommand)?;
    bus.subscribe(ComponentId::FlightController, MessageType::SystemStatus)?;

    log::info!(target: "airplane_sim::flight_controller", "initialized successfully");
    Ok(Self {
      bus,
      state: ExtendedFlightState::new(),
      component_pids: [None; crate::common::MAX_COMPONENTS],
      running: false,
    })
  }

  /// Fork every component in [`START_ORDER`], 100ms apart.
  pub fn start(&mut self) -> crate::Result<()> {
    log::info!(target: "airplane_sim::flight_controller", "starting {} components", START_ORDER.len());
    for component in START_ORDER {
      self.spawn_component(component)?;
      std::thread::sleep(SPAWN_GAP);
    }
    self.running = true;
    log::info!(target: "airplane_sim::flight_controller", "all components started successfully");
    Ok(())
  }

  /// Fork one component process; the child re-attaches to the bus and
  /// runs its entry point, then detaches and exits.
  fn spawn_component(&mut self, component: ComponentId) -> crate::Result<()> {
    log::info!(target: "airplane_sim::flight_controller", "spawning component {component}...");
    let segment_id = self.bus.get_segment_id().to_string();

    match unsafe { fork() } {
      Ok(ForkResult::Parent { child }) => {
        log::info!(
          target: "airplane_sim::flight_controller",
          "parent: component {component} spawned with pid {child}"
        );
        self.component_pids[component.index()] = Some(child);
        Ok(())
      }
      Ok(ForkResult::Child) => {
        crate::logging::init();
        run_child(component, &segment_id);
        std::process::exit(0)
      }
      Err(e) => Err(crate::error::SimError::ResourceUnavailable(format!(
        "fork failed: {e}"
      ))),
    }
  }

  /// Drain inbound messages, dispatching each by type, and reap
  /// terminated children, respawning them. Call on every tick of the
  /// main loop.
  pub fn process_messages(&mut self) {
    if !self.running {
      return;
    }

    while let Some(msg) = self.bus.read_message(ComponentId::FlightController) {
      match msg.payload {
        MessagePayload::PositionUpdate { position } => {
          self.state.update_position(msg.header.sender, position);
          let response =
            Message::state_response(ComponentId::FlightController, ComponentId::Autopilot, self.state.basic);
          self.publish(response);
        }
        MessagePayload::StateRequest => {
          let response = Message::state_response(
            ComponentId::FlightController,
            msg.header.sender,
            self.state.basic,
          );
          self.publish(response);
        }
        MessagePayload::AutopilotCommand {
          target_heading,
          target_speed,
          target_altitude,
        } => {
          self
            .state
            .update_autopilot(target_altitude, target_heading, target_speed);
        }
        MessagePayload::SystemStatus { component_active } => {
          self.state.update_system_status(msg.header.sender, component_active);
        }
        MessagePayload::StateResponse { .. } => {
          // The flight controller doesn't handle state responses.
        }
      }
    }

    self.reap_and_respawn();
  }

  fn publish(&mut self, msg: Message) {
    if let Err(e) = self.bus.publish(msg) {
      log::error!(target: "airplane_sim::flight_controller", "failed to publish: {e}");
    }
  }

  /// Non-blocking reap of any terminated children; each one has its
  /// connected/operational flag cleared and is respawned via the same
  /// path used at start-up.
  fn reap_and_respawn(&mut self) {
    loop {
      match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
        Ok(WaitStatus::StillAlive) | Err(_) => break,
        Ok(WaitStatus::Exited(pid, _)) | Ok(WaitStatus::Signaled(pid, _, _)) => {
          self.handle_child_exit(pid);
        }
        Ok(_) => continue,
      }
    }
  }

  fn handle_child_exit(&mut self, pid: Pid) {
    let Some(component) = ComponentId::ALL
      .into_iter()
      .find(|c| self.component_pids[c.index()] == Some(pid))
    else {
      return;
    };

    log::warn!(target: "airplane_sim::flight_controller", "child process {pid} ({component}) terminated");
    self.state.update_system_status(component, false);
    self.component_pids[component.index()] = None;

    if let Err(e) = self.spawn_component(component) {
      log::error!(target: "airplane_sim::flight_controller", "failed to respawn {component}: {e}");
    }
  }

  pub fn state(&self) -> &ExtendedFlightState {
    &self.state
  }

  /// Graceful-then-forced shutdown of every live child, then detach the
  /// bus last — the supervisor must be the final detacher so it's the
  /// one that unlinks the shared segment and mutex.
  pub fn shutdown(mut self) {
    log::info!(target: "airplane_sim::flight_controller", "starting cleanup...");
    self.running = false;

    for component in ComponentId::ALL {
      let Some(pid) = self.component_pids[component.index()].take() else {
        continue;
      };
      log::info!(
        target: "airplane_sim::flight_controller",
        "terminating component {component} (pid {pid})..."
      );
      let _ = signal::kill(pid, Signal::SIGTERM);

      match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
        Ok(WaitStatus::StillAlive) => {
          std::thread::sleep(GRACEFUL_SHUTDOWN_WAIT);
          match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => {
              log::warn!(target: "airplane_sim::flight_controller", "force killing component {component}...");
              let _ = signal::kill(pid, Signal::SIGKILL);
              let _ = waitpid(pid, None);
            }
            _ => {}
          }
        }
        _ => {}
      }
    }

    self.bus.detach();
    log::info!(target: "airplane_sim::flight_controller", "cleanup complete");
  }
}

fn run_child(component: ComponentId, segment_id: &str) {
  log::info!(target: "airplane_sim::flight_controller", "child process for component {component} started");
  let child_bus = match Bus::attach(segment_id) {
    Ok(bus) => bus,
    Err(e) => {
      log::error!(target: "airplane_sim::flight_controller", "child failed to attach to bus: {e}");
      std::process::exit(1);
    }
  };

  match component {
    ComponentId::Gps => gps_main(child_bus),
    ComponentId::Ins => ins_main(child_bus),
    ComponentId::LandingRadio => landing_radio_main(child_bus),
    ComponentId::SatCom => sat_com_main(child_bus),
    ComponentId::Autopilot => crate::autopilot::autopilot_main(child_bus),
    ComponentId::FlightController => {
      log::error!(target: "airplane_sim::flight_controller", "unknown component type");
      std::process::exit(1);
    }
  }
}
