//! Session configuration with environment overrides.

use crate::stereo::DisplayDescription;
use std::time::Duration;

/// Runtime settings for a bridge session.
///
/// The controller binding table is fixed at build time; only device paths,
/// scale and display parameters are configurable.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// World units per meter until a level applies its own.
    pub world_to_meters_scale: f32,
    pub head_path: String,
    pub left_hand_path: String,
    pub right_hand_path: String,
    /// Run `update()` on a background thread at this interval. `None` leaves
    /// pumping to the per-frame tick.
    pub pump_interval: Option<Duration>,
    pub positional_tracking: bool,
    pub low_persistence: bool,
    pub display: DisplayDescription,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            world_to_meters_scale: 100.0,
            head_path: "/me/head".to_string(),
            left_hand_path: "/me/hands/left".to_string(),
            right_hand_path: "/me/hands/right".to_string(),
            pump_interval: None,
            positional_tracking: true,
            low_persistence: false,
            display: DisplayDescription::default(),
        }
    }
}

impl BridgeConfig {
    /// Defaults overridden by `HMD_BRIDGE_*` environment variables.
    ///
    /// Unparseable values fall back to the default with a warning.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let mut display = defaults.display;
        if let Some(ipd_mm) = read_env_f32("HMD_BRIDGE_IPD_MM") {
            display.ipd_meters = ipd_mm / 1000.0;
        }

        let pump_ms = read_env_u64("HMD_BRIDGE_PUMP_INTERVAL_MS").unwrap_or(0);

        let config = Self {
            world_to_meters_scale: read_env_f32("HMD_BRIDGE_WORLD_TO_METERS")
                .filter(|s| *s > 0.0)
                .unwrap_or(defaults.world_to_meters_scale),
            head_path: read_env_string("HMD_BRIDGE_HEAD_PATH", &defaults.head_path),
            left_hand_path: read_env_string("HMD_BRIDGE_LEFT_HAND_PATH", &defaults.left_hand_path),
            right_hand_path: read_env_string("HMD_BRIDGE_RIGHT_HAND_PATH", &defaults.right_hand_path),
            pump_interval: (pump_ms > 0).then(|| Duration::from_millis(pump_ms)),
            positional_tracking: read_env_bool("HMD_BRIDGE_POSITIONAL_TRACKING", defaults.positional_tracking),
            low_persistence: read_env_bool("HMD_BRIDGE_LOW_PERSISTENCE", defaults.low_persistence),
            display,
        };
        log::debug!("Bridge config: {:?}", config);
        config
    }
}

fn read_env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => parse_bool(&v).unwrap_or_else(|| {
            log::warn!("Ignoring {}='{}' (expected a boolean)", name, v);
            default
        }),
        Err(_) => default,
    }
}

fn read_env_f32(name: &str) -> Option<f32> {
    let v = std::env::var(name).ok()?;
    let parsed = v.trim().parse::<f32>().ok().filter(|f| f.is_finite());
    if parsed.is_none() {
        log::warn!("Ignoring {}='{}' (expected a number)", name, v);
    }
    parsed
}

fn read_env_u64(name: &str) -> Option<u64> {
    let v = std::env::var(name).ok()?;
    let parsed = v.trim().parse::<u64>().ok();
    if parsed.is_none() {
        log::warn!("Ignoring {}='{}' (expected an integer)", name, v);
    }
    parsed
}

fn read_env_string(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
