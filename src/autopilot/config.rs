//! Loading and defaulting `AutopilotConfig`.
//!
//! Grounded in `autopilot_load_config` (`autopilot.c`): start from the
//! literal defaults, then overwrite only the fields actually present in
//! the parsed JSON document, tolerating a missing file or a malformed
//! one. Field-by-field defaulting like this is why the config type is
//! deserialized into an all-`Option` shadow struct rather than derived
//! straight onto `AutopilotConfig` — a present-but-null field should fall
//! back to the default the same as an absent one, and `serde`'s
//! `#[serde(default)]` alone can't express "ignore whichever individual
//! fields are missing, keep the rest."

use std::path::Path;

use serde::Deserialize;

use crate::common::physics::EARTH_RADIUS_M;

/// Origin used for the initial great-circle bearing calculation when
/// `target_heading` is left at its default of `0.0`.
pub const HOME_LATITUDE: f64 = 37.7749;
pub const HOME_LONGITUDE: f64 = -122.4194;

#[derive(Debug, Clone, Copy)]
pub struct PidGains {
  pub kp: f64,
  pub ki: f64,
  pub kd: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct AutopilotConfig {
  pub target_latitude: f64,
  pub target_longitude: f64,
  pub target_altitude: f64,
  pub target_speed: f64,
  pub target_heading: f64,

  pub max_climb_rate: f64,
  pub max_descent_rate: f64,
  pub max_bank_angle: f64,
  pub max_pitch_angle: f64,
  pub max_speed: f64,
  pub min_speed: f64,
  pub max_heading_rate: f64,

  pub heading_pid: PidGains,
  pub altitude_pid: PidGains,
  pub speed_pid: PidGains,
}

impl Default for AutopilotConfig {
  fn default() -> Self {
    Self {
      target_latitude: 37.7749,
      target_longitude: -122.4194,
      target_altitude: 10_000.0,
      target_speed: 250.0,
      target_heading: 0.0,

      max_climb_rate: 2000.0,
      max_descent_rate: 1500.0,
      max_bank_angle: 25.0,
      max_pitch_angle: 15.0,
      max_speed: 350.0,
      min_speed: 120.0,
      max_heading_rate: 3.0,

      heading_pid: PidGains {
        kp: 1.0,
        ki: 0.1,
        kd: 0.2,
      },
      altitude_pid: PidGains {
        kp: 0.5,
        ki: 0.05,
        kd: 0.1,
      },
      speed_pid: PidGains {
        kp: 0.3,
        ki: 0.02,
        kd: 0.05,
      },
    }
  }
}

/// Mirrors [`AutopilotConfig`] with every field optional so a partially
/// specified (or entirely absent/malformed) JSON document only overrides
/// the fields it actually names.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
  target_latitude: Option<f64>,
  target_longitude: Option<f64>,
  target_altitude: Option<f64>,
  target_speed: Option<f64>,
  target_heading: Option<f64>,

  max_climb_rate: Option<f64>,
  max_descent_rate: Option<f64>,
  max_bank_angle: Option<f64>,
  max_pitch_angle: Option<f64>,
  max_speed: Option<f64>,
  min_speed: Option<f64>,
  max_heading_rate: Option<f64>,

  heading_pid: Option<[f64; 3]>,
  altitude_pid: Option<[f64; 3]>,
  speed_pid: Option<[f64; 3]>,
}

impl AutopilotConfig {
  /// Load from `path`, falling back to documented defaults field-by-field
  /// on a missing file, unreadable file, or malformed JSON. Never fails.
  pub fn load(path: &Path) -> Self {
    let mut config = Self::default();

    let raw = std::fs::read_to_string(path)
      .ok()
      .and_then(|text| match serde_json::from_str::<RawConfig>(&text) {
        Ok(raw) => Some(raw),
        Err(e) => {
          log::warn!(
            target: "airplane_sim::autopilot",
            "malformed config at {}: {e}, using defaults",
            path.display()
          );
          None
        }
      });

    let Some(raw) = raw else {
      log::warn!(
        target: "airplane_sim::autopilot",
        "failed to load config file {}, using defaults", path.display()
      );
      return Self::finish(config);
    };

    if let Some(v) = raw.target_latitude {
      config.target_latitude = v;
    }
    if let Some(v) = raw.target_longitude {
      config.target_longitude = v;
    }
    if let Some(v) = raw.target_altitude {
      config.target_altitude = v;
    }
    if let Some(v) = raw.target_speed {
      config.target_speed = v;
    }
    if let Some(v) = raw.target_heading {
      config.target_heading = v;
    }
    if let Some(v) = raw.max_climb_rate {
      config.max_climb_rate = v;
    }
    if let Some(v) = raw.max_descent_rate {
      config.max_descent_rate = v;
    }
    if let Some(v) = raw.max_bank_angle {
      config.max_bank_angle = v;
    }
    if let Some(v) = raw.max_pitch_angle {
      config.max_pitch_angle = v;
    }
    if let Some(v) = raw.max_speed {
      config.max_speed = v;
    }
    if let Some(v) = raw.min_speed {
      config.min_speed = v;
    }
    if let Some(v) = raw.max_heading_rate {
      config.max_heading_rate = v;
    }
    if let Some([kp, ki, kd]) = raw.heading_pid {
      config.heading_pid = PidGains { kp, ki, kd };
    }
    if let Some([kp, ki, kd]) = raw.altitude_pid {
      config.altitude_pid = PidGains { kp, ki, kd };
    }
    if let Some([kp, ki, kd]) = raw.speed_pid {
      config.speed_pid = PidGains { kp, ki, kd };
    }

    log::info!(
      target: "airplane_sim::autopilot",
      "loaded config from {}", path.display()
    );
    Self::finish(config)
  }

  /// Fill in `target_heading` via great-circle bearing when left at its
  /// sentinel default of `0.0`.
  fn finish(mut config: Self) -> Self {
    if config.target_heading == 0.0 {
      config.target_heading = great_circle_bearing(
        HOME_LATITUDE,
        HOME_LONGITUDE,
        config.target_latitude,
        config.target_longitude,
      );
    }
    config
  }
}

/// Initial compass bearing in `[0, 360)` degrees from `(lat1, lon1)` to
/// `(lat2, lon2)`, both in degrees, along the spherical-earth geodesic.
pub fn great_circle_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
  let lat1 = lat1.to_radians();
  let lon1 = lon1.to_radians();
  let lat2 = lat2.to_radians();
  let lon2 = lon2.to_radians();

  let y = (lon2 - lon1).sin() * lat2.cos();
  let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * (lon2 - lon1).cos();
  let bearing = y.atan2(x).to_degrees();
  if bearing < 0.0 {
    bearing + 360.0
  } else {
    bearing
  }
}

/// Great-circle distance in meters, for callers that want it alongside
/// the bearing (unused by the core control loop; kept with the bearing
/// math since both derive from the same spherical-law-of-cosines model).
#[allow(dead_code)]
pub fn great_circle_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
  let lat1 = lat1.to_radians();
  let lon1 = lon1.to_radians();
  let lat2 = lat2.to_radians();
  let lon2 = lon2.to_radians();

  let dlat = lat2 - lat1;
  let dlon = lon2 - lon1;
  let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
  let c = 2.0 * a.sqrt().asin();
  EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn missing_file_yields_defaults_with_computed_heading() {
    let config = AutopilotConfig::load(Path::new("/nonexistent/does/not/exist.json"));
    assert_eq!(config.target_altitude, 10_000.0);
    assert_eq!(config.target_speed, 250.0);
    assert_ne!(config.target_heading, 0.0);
  }

  #[test]
  fn partial_config_overrides_only_named_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("autopilot_config.json");
    let mut file = std::fs::File::create(&path).unwrap();
    write!(file, r#"{{"target_speed": 300.0, "heading_pid": [2.0, 0.2, 0.4]}}"#).unwrap();
    drop(file);

    let config = AutopilotConfig::load(&path);
    assert_eq!(config.target_speed, 300.0);
    assert_eq!(config.heading_pid.kp, 2.0);
    assert_eq!(config.target_altitude, 10_000.0);
  }

  #[test]
  fn malformed_json_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("autopilot_config.json");
    std::fs::write(&path, b"not json at all {{{").unwrap();

    let config = AutopilotConfig::load(&path);
    assert_eq!(config.target_speed, 250.0);
  }

  #[test]
  fn explicit_target_heading_is_not_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("autopilot_config.json");
    std::fs::write(&path, br#"{"target_heading": 42.0}"#).unwrap();

    let config = AutopilotConfig::load(&path);
    assert_eq!(config.target_heading, 42.0);
  }

  #[test]
  fn bearing_due_east_is_ninety_degrees() {
    let bearing = great_circle_bearing(0.0, 0.0, 0.0, 1.0);
    assert!((bearing - 90.0).abs() < 0.01);
  }
}
