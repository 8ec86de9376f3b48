//! Binary entry point: init logging, init the bus, start the flight
//! controller, then run the 10ms message loop until a signal requests
//! shutdown. Ported from `main.c`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use airplane_sim::bus::Bus;
use airplane_sim::flight_controller::FlightController;

const MAIN_LOOP_TICK: Duration = Duration::from_millis(10);
const STATUS_PRINT_INTERVAL_S: u64 = 1;

fn main() {
  airplane_sim::logging::init();
  log::info!(target: "airplane_sim::main", "starting aircraft simulation...");

  let running = Arc::new(AtomicBool::new(true));
  {
    let running = Arc::clone(&running);
    if let Err(e) = ctrlc::set_handler(move || {
      log::info!(target: "airplane_sim::main", "received shutdown signal, initiating shutdown...");
      running.store(false, Ordering::SeqCst);
    }) {
      log::error!(target: "airplane_sim::main", "failed to install signal handler: {e}");
    }
  }

  let bus = match Bus::init() {
    Ok(bus) => bus,
    Err(e) => {
      log::error!(target: "airplane_sim::main", "failed to initialize message bus: {e}");
      std::process::exit(1);
    }
  };

  let mut controller = match FlightController::init(bus) {
    Ok(controller) => controller,
    Err(e) => {
      log::error!(target: "airplane_sim::main", "failed to initialize flight controller: {e}");
      std::process::exit(1);
    }
  };

  if let Err(e) = controller.start() {
    log::error!(target: "airplane_sim::main", "failed to start flight controller: {e}");
    std::process::exit(1);
  }

  log::info!(target: "airplane_sim::main", "all systems initialized. Running simulation...");

  let mut last_print = 0u64;
  while running.load(Ordering::SeqCst) {
    controller.process_messages();

    let now = airplane_sim::common::unix_timestamp();
    if now.saturating_sub(last_print) >= STATUS_PRINT_INTERVAL_S {
      print!("\x1b[2J\x1b[H");
      println!("{}", controller.state());
      last_print = now;
    }

    std::thread::sleep(MAIN_LOOP_TICK);
  }

  controller.shutdown();
  log::info!(target: "airplane_sim::main", "simulation shutdown complete");
}
