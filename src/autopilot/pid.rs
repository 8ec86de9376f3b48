//! The three saturating PID loops, ported from `update_pid_controls` in
//! `autopilot.c`. `dt` is the fixed tick period, not a wall-clock delta —
//! preserved deliberately for determinism — and none of the three
//! integrators are clamped; unbounded windup is an accepted open issue,
//! not a bug to fix here.

use super::config::PidGains;

/// Tick period in seconds; also used as the PID `dt`.
pub const DT_S: f64 = 0.1;

/// `{integral, last_error}` for a single control axis, zero-initialized.
#[derive(Debug, Clone, Copy, Default)]
struct Loop {
  integral: f64,
  last_error: f64,
}

impl Loop {
  /// Accumulate `error` and return the raw (unclamped) PID output.
  fn step(&mut self, error: f64, gains: PidGains) -> f64 {
    self.integral += error * DT_S;
    let derivative = (error - self.last_error) / DT_S;
    let output = gains.kp * error + gains.ki * self.integral + gains.kd * derivative;
    self.last_error = error;
    output
  }
}

/// Holds the per-axis PID state across ticks, as fields of the autopilot
/// instance rather than process-global statics.
#[derive(Debug, Clone, Copy, Default)]
pub struct PidState {
  heading: Loop,
  altitude: Loop,
  speed: Loop,
}

/// Result of one control-loop tick: the new absolute targets to publish
/// as an `AUTOPILOT_COMMAND`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlOutput {
  pub heading: f64,
  pub altitude: f64,
  pub speed: f64,
}

impl PidState {
  /// Run one tick of all three loops and return the new absolute targets.
  #[allow(clippy::too_many_arguments)]
  pub fn tick(
    &mut self,
    current_heading: f64,
    current_altitude: f64,
    current_speed: f64,
    target_heading: f64,
    target_altitude: f64,
    target_speed: f64,
    config: &super::config::AutopilotConfig,
  ) -> ControlOutput {
    ControlOutput {
      heading: self.tick_heading(current_heading, target_heading, config),
      altitude: self.tick_altitude(current_altitude, target_altitude, config),
      speed: self.tick_speed(current_speed, target_speed, config),
    }
  }

  /// Normalize the error into `[-180, 180]`, clamp the output to
  /// `±max_heading_rate`, and wrap the result back into `[0, 360)`.
  fn tick_heading(
    &mut self,
    current: f64,
    target: f64,
    config: &super::config::AutopilotConfig,
  ) -> f64 {
    let mut error = target - current;
    if error > 180.0 {
      error -= 360.0;
    }
    if error < -180.0 {
      error += 360.0;
    }

    let raw = self.heading.step(error, config.heading_pid);
    let clamped = raw.clamp(-config.max_heading_rate, config.max_heading_rate);

    let mut new_heading = current + clamped;
    while new_heading >= 360.0 {
      new_heading -= 360.0;
    }
    while new_heading < 0.0 {
      new_heading += 360.0;
    }
    new_heading
  }

  /// Clamp positive output to `max_climb_rate`, negative output to
  /// `-max_descent_rate`, then apply directly as a feet-per-tick delta —
  /// the legacy interpretation, not a rate.
  fn tick_altitude(
    &mut self,
    current: f64,
    target: f64,
    config: &super::config::AutopilotConfig,
  ) -> f64 {
    let error = target - current;
    let raw = self.altitude.step(error, config.altitude_pid);
    let clamped = if raw > 0.0 {
      raw.min(config.max_climb_rate)
    } else {
      raw.max(-config.max_descent_rate)
    };
    current + clamped
  }

  /// Form the candidate `current + raw_output`, clamp it into
  /// `[min_speed, max_speed]`, then express as a delta from `current` so
  /// the applied command always lands inside the envelope.
  fn tick_speed(
    &mut self,
    current: f64,
    target: f64,
    config: &super::config::AutopilotConfig,
  ) -> f64 {
    let error = target - current;
    let raw = self.speed.step(error, config.speed_pid);
    let candidate = (current + raw).clamp(config.min_speed, config.max_speed);
    current + (candidate - current)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::autopilot::config::AutopilotConfig;

  fn config_with(max_heading_rate: f64, min_speed: f64, max_speed: f64) -> AutopilotConfig {
    let mut config = AutopilotConfig::default();
    config.max_heading_rate = max_heading_rate;
    config.min_speed = min_speed;
    config.max_speed = max_speed;
    config.heading_pid = PidGains {
      kp: 1.0,
      ki: 0.0,
      kd: 0.0,
    };
    config.speed_pid = PidGains {
      kp: 0.3,
      ki: 0.0,
      kd: 0.0,
    };
    config
  }

  #[test]
  fn heading_wrap_crosses_zero_in_two_ticks() {
    let config = config_with(3.0, 120.0, 350.0);
    let mut pid = PidState::default();

    let h1 = pid.tick_heading(350.0, 10.0, &config);
    assert!((h1 - 353.0).abs() < 1e-9);

    let h2 = pid.tick_heading(353.0, 10.0, &config);
    assert!((h2 - 356.0).abs() < 1e-9);
  }

  #[test]
  fn speed_saturation_clamps_to_max() {
    let config = config_with(3.0, 120.0, 350.0);
    let mut pid = PidState::default();
    let new_speed = pid.tick_speed(340.0, 500.0, &config);
    assert!((new_speed - 350.0).abs() < 1e-9);
  }

  #[test]
  fn altitude_climb_is_limited_to_max_climb_rate() {
    let mut config = AutopilotConfig::default();
    config.max_climb_rate = 50.0;
    config.altitude_pid = PidGains {
      kp: 1.0,
      ki: 0.0,
      kd: 0.0,
    };
    let mut pid = PidState::default();
    let new_altitude = pid.tick_altitude(1000.0, 5000.0, &config);
    assert!((new_altitude - 1050.0).abs() < 1e-9);
  }
}
