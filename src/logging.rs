//! Thin façade over the `log` crate, initialised once per process.
//!
//! The original C core (`log.h`/`log.c`) rolled its own category/level
//! engine from scratch. `log`'s `target` field already gives us a
//! per-module category axis and `RUST_LOG` already gives us per-target
//! level filtering, so there is nothing left for this module to
//! implement beyond wiring up `env_logger` once at process start and
//! picking conventional target strings. Each component logs through the
//! ordinary `log::{error,warn,info,debug,trace}!` macros with
//! `target: "airplane_sim::<component>"`.

/// Initialise the global logger for the current process. Safe to call
/// more than once (subsequent calls are no-ops) so every forked child's
/// entry point can call it without coordinating with the parent.
pub fn init() {
  let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
    .format_timestamp_millis()
    .try_init();
}
