// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration for the chiller link and the lamp.
//!
//! Configuration is read once when the supervisor is built and is not
//! changed afterwards. Durations are written as seconds in JSON documents.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use atwhitelight::config::WhiteLightConfig;
//!
//! let config = WhiteLightConfig::from_json_str(r#"{
//!     "chiller": { "host": "10.0.0.5", "port": 4001, "initial_temperature": 18.0 },
//!     "lamp": { "default_power": 1000.0, "warmup_period": 600 }
//! }"#).unwrap();
//!
//! assert_eq!(config.chiller.port, 4001);
//! assert_eq!(config.lamp.warmup_period, Duration::from_secs(600));
//! assert_eq!(config.lamp.cooldown_period, Duration::from_secs(900));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::protocol::DEFAULT_DEVICE_ID;
use crate::types::{LampPower, ThresholdKind, ThresholdLevel};

/// Complete supervisor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhiteLightConfig {
    /// Chiller link and thresholds.
    pub chiller: ChillerConfig,
    /// Lamp timing and power.
    #[serde(default)]
    pub lamp: LampConfig,
}

impl WhiteLightConfig {
    /// Creates a configuration with defaults for everything but the
    /// chiller address.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            chiller: ChillerConfig::new(host, port),
            lamp: LampConfig::default(),
        }
    }

    /// Replaces the lamp configuration.
    #[must_use]
    pub fn with_lamp(mut self, lamp: LampConfig) -> Self {
        self.lamp = lamp;
        self
    }

    /// Replaces the chiller configuration.
    #[must_use]
    pub fn with_chiller(mut self, chiller: ChillerConfig) -> Self {
        self.chiller = chiller;
        self
    }

    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Json` for malformed documents and
    /// `ConfigError::Invalid` if validation fails.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every field.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chiller.validate()?;
        self.lamp.validate()
    }
}

/// Chiller connection, polling and threshold settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChillerConfig {
    /// Host of the TCP-to-serial bridge.
    pub host: String,
    /// Port of the TCP-to-serial bridge.
    pub port: u16,
    /// Two-digit device ID.
    pub device_id: String,
    /// Control temperature commanded on first connection (C).
    pub initial_temperature: f64,
    /// Ambient temperature warning, lower limit (C).
    pub low_ambient_temperature_warning: f64,
    /// Ambient temperature warning, upper limit (C).
    pub high_ambient_temperature_warning: f64,
    /// Supply temperature warning, lower limit (C).
    pub low_supply_temperature_warning: f64,
    /// Supply temperature warning, upper limit (C).
    pub high_supply_temperature_warning: f64,
    /// Coolant flow warning, lower limit (L/min).
    pub low_coolant_flow_rate_warning: f64,
    /// Ambient temperature alarm, lower limit (C).
    pub low_ambient_temperature_alarm: f64,
    /// Ambient temperature alarm, upper limit (C).
    pub high_ambient_temperature_alarm: f64,
    /// Supply temperature alarm, lower limit (C).
    pub low_supply_temperature_alarm: f64,
    /// Supply temperature alarm, upper limit (C).
    pub high_supply_temperature_alarm: f64,
    /// Coolant flow alarm, lower limit (L/min).
    pub low_coolant_flow_rate_alarm: f64,
    /// Time allowed to open the TCP connection.
    #[serde(with = "seconds")]
    pub connect_timeout: Duration,
    /// Time allowed for the chiller to reply to one command.
    #[serde(with = "seconds")]
    pub command_timeout: Duration,
    /// Interval between telemetry sweeps.
    #[serde(with = "seconds")]
    pub telemetry_interval: Duration,
    /// Interval between watchdog polls; the supervisor cycle period.
    #[serde(with = "seconds")]
    pub watchdog_interval: Duration,
    /// Minimum time between alarm onset and the level-1 alarm read that
    /// resets the latched alarm.
    #[serde(with = "seconds")]
    pub alarm_reset_holdoff: Duration,
}

impl ChillerConfig {
    /// Creates a chiller configuration with default thresholds.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Sets the initial control temperature.
    #[must_use]
    pub fn with_initial_temperature(mut self, celsius: f64) -> Self {
        self.initial_temperature = celsius;
        self
    }

    /// Sets the command timeout.
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Sets the watchdog interval.
    #[must_use]
    pub fn with_watchdog_interval(mut self, interval: Duration) -> Self {
        self.watchdog_interval = interval;
        self
    }

    /// Sets the telemetry interval.
    #[must_use]
    pub fn with_telemetry_interval(mut self, interval: Duration) -> Self {
        self.telemetry_interval = interval;
        self
    }

    /// Sets the alarm reset holdoff.
    #[must_use]
    pub fn with_alarm_reset_holdoff(mut self, holdoff: Duration) -> Self {
        self.alarm_reset_holdoff = holdoff;
        self
    }

    /// Returns `true` if `celsius` is an acceptable control temperature.
    #[must_use]
    pub fn accepts_temperature(&self, celsius: f64) -> bool {
        (self.low_supply_temperature_warning..=self.high_supply_temperature_warning)
            .contains(&celsius)
    }

    /// Returns the configured threshold value.
    #[must_use]
    pub fn threshold(&self, level: ThresholdLevel, kind: ThresholdKind) -> f64 {
        match (level, kind) {
            (ThresholdLevel::Warning, ThresholdKind::HighSupplyTemperature) => {
                self.high_supply_temperature_warning
            }
            (ThresholdLevel::Warning, ThresholdKind::LowSupplyTemperature) => {
                self.low_supply_temperature_warning
            }
            (ThresholdLevel::Warning, ThresholdKind::HighAmbientTemperature) => {
                self.high_ambient_temperature_warning
            }
            (ThresholdLevel::Warning, ThresholdKind::LowAmbientTemperature) => {
                self.low_ambient_temperature_warning
            }
            (ThresholdLevel::Warning, ThresholdKind::LowCoolantFlowRate) => {
                self.low_coolant_flow_rate_warning
            }
            (ThresholdLevel::Alarm, ThresholdKind::HighSupplyTemperature) => {
                self.high_supply_temperature_alarm
            }
            (ThresholdLevel::Alarm, ThresholdKind::LowSupplyTemperature) => {
                self.low_supply_temperature_alarm
            }
            (ThresholdLevel::Alarm, ThresholdKind::HighAmbientTemperature) => {
                self.high_ambient_temperature_alarm
            }
            (ThresholdLevel::Alarm, ThresholdKind::LowAmbientTemperature) => {
                self.low_ambient_temperature_alarm
            }
            (ThresholdLevel::Alarm, ThresholdKind::LowCoolantFlowRate) => {
                self.low_coolant_flow_rate_alarm
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(invalid("chiller.host must not be empty"));
        }
        if self.device_id.len() != 2 || !self.device_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid(format!(
                "chiller.device_id={:?} must be two digits",
                self.device_id
            )));
        }
        for (name, low, high) in [
            (
                "ambient temperature warning",
                self.low_ambient_temperature_warning,
                self.high_ambient_temperature_warning,
            ),
            (
                "supply temperature warning",
                self.low_supply_temperature_warning,
                self.high_supply_temperature_warning,
            ),
            (
                "ambient temperature alarm",
                self.low_ambient_temperature_alarm,
                self.high_ambient_temperature_alarm,
            ),
            (
                "supply temperature alarm",
                self.low_supply_temperature_alarm,
                self.high_supply_temperature_alarm,
            ),
        ] {
            if low >= high {
                return Err(invalid(format!(
                    "{name}: low={low} must be below high={high}"
                )));
            }
        }
        if self.low_coolant_flow_rate_warning <= 0.0 || self.low_coolant_flow_rate_alarm <= 0.0 {
            return Err(invalid("coolant flow thresholds must be positive"));
        }
        if !self.accepts_temperature(self.initial_temperature) {
            return Err(invalid(format!(
                "initial_temperature={} must be in range [{}, {}]",
                self.initial_temperature,
                self.low_supply_temperature_warning,
                self.high_supply_temperature_warning
            )));
        }
        for (name, value) in [
            ("connect_timeout", self.connect_timeout),
            ("command_timeout", self.command_timeout),
            ("telemetry_interval", self.telemetry_interval),
            ("watchdog_interval", self.watchdog_interval),
        ] {
            if value.is_zero() {
                return Err(invalid(format!("chiller.{name} must be positive")));
            }
        }
        Ok(())
    }
}

impl Default for ChillerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4001,
            device_id: DEFAULT_DEVICE_ID.to_string(),
            initial_temperature: 20.0,
            low_ambient_temperature_warning: 10.0,
            high_ambient_temperature_warning: 35.0,
            low_supply_temperature_warning: 15.0,
            high_supply_temperature_warning: 25.0,
            low_coolant_flow_rate_warning: 0.8,
            low_ambient_temperature_alarm: 5.0,
            high_ambient_temperature_alarm: 40.0,
            low_supply_temperature_alarm: 10.0,
            high_supply_temperature_alarm: 30.0,
            low_coolant_flow_rate_alarm: 0.5,
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(5),
            telemetry_interval: Duration::from_secs(10),
            watchdog_interval: Duration::from_secs(1),
            alarm_reset_holdoff: Duration::from_secs(2),
        }
    }
}

/// Lamp power, timing and shutter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LampConfig {
    /// Power used when a turn-on request does not name one.
    pub default_power: LampPower,
    /// Minimum on-time before the lamp may be turned off without force.
    #[serde(with = "seconds")]
    pub warmup_period: Duration,
    /// Minimum off-time before the lamp may be turned on again.
    #[serde(with = "seconds")]
    pub cooldown_period: Duration,
    /// Ignition retries after the first failed attempt.
    pub max_retries: u32,
    /// Time with power off between ignition attempts.
    #[serde(with = "seconds")]
    pub retry_sleep: Duration,
    /// Time allowed for light to appear after power is applied.
    #[serde(with = "seconds")]
    pub max_lamp_on_delay: Duration,
    /// Time allowed for light to disappear after power is removed.
    #[serde(with = "seconds")]
    pub max_lamp_off_delay: Duration,
    /// Time allowed for the shutter to reach a limit switch.
    #[serde(with = "seconds")]
    pub shutter_timeout: Duration,
    /// Photosensor voltage at or above which the lamp is considered lit.
    pub photosensor_threshold: f64,
    /// How often the lamp inputs are sampled. Fast enough to resolve the
    /// controller's half-second blinks.
    #[serde(with = "seconds")]
    pub status_interval: Duration,
}

impl LampConfig {
    /// Sets the default power.
    #[must_use]
    pub fn with_default_power(mut self, power: LampPower) -> Self {
        self.default_power = power;
        self
    }

    /// Sets the warmup period.
    #[must_use]
    pub fn with_warmup_period(mut self, period: Duration) -> Self {
        self.warmup_period = period;
        self
    }

    /// Sets the cooldown period.
    #[must_use]
    pub fn with_cooldown_period(mut self, period: Duration) -> Self {
        self.cooldown_period = period;
        self
    }

    /// Sets the ignition retry budget and the pause between attempts.
    #[must_use]
    pub fn with_retries(mut self, max_retries: u32, retry_sleep: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_sleep = retry_sleep;
        self
    }

    /// Sets the ignition timeout.
    #[must_use]
    pub fn with_max_lamp_on_delay(mut self, delay: Duration) -> Self {
        self.max_lamp_on_delay = delay;
        self
    }

    /// Sets the extinction timeout.
    #[must_use]
    pub fn with_max_lamp_off_delay(mut self, delay: Duration) -> Self {
        self.max_lamp_off_delay = delay;
        self
    }

    /// Sets the shutter timeout.
    #[must_use]
    pub fn with_shutter_timeout(mut self, timeout: Duration) -> Self {
        self.shutter_timeout = timeout;
        self
    }

    /// Sets the lamp input sampling interval.
    #[must_use]
    pub fn with_status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.default_power.is_on() {
            return Err(invalid("lamp.default_power must be in range [800, 1200] W"));
        }
        for (name, value) in [
            ("max_lamp_on_delay", self.max_lamp_on_delay),
            ("max_lamp_off_delay", self.max_lamp_off_delay),
            ("shutter_timeout", self.shutter_timeout),
            ("status_interval", self.status_interval),
        ] {
            if value.is_zero() {
                return Err(invalid(format!("lamp.{name} must be positive")));
            }
        }
        if self.status_interval > MAX_STATUS_INTERVAL {
            return Err(invalid(format!(
                "lamp.status_interval={}s must not exceed {}s",
                self.status_interval.as_secs_f64(),
                MAX_STATUS_INTERVAL.as_secs_f64()
            )));
        }
        if !self.photosensor_threshold.is_finite() || self.photosensor_threshold <= 0.0 {
            return Err(invalid("lamp.photosensor_threshold must be positive"));
        }
        Ok(())
    }
}

impl Default for LampConfig {
    fn default() -> Self {
        Self {
            default_power: LampPower::MAX,
            warmup_period: Duration::from_secs(900),
            cooldown_period: Duration::from_secs(900),
            max_retries: 3,
            retry_sleep: Duration::from_secs(30),
            max_lamp_on_delay: Duration::from_secs(60),
            max_lamp_off_delay: Duration::from_secs(60),
            shutter_timeout: Duration::from_secs(15),
            photosensor_threshold: 1.0,
            status_interval: Duration::from_millis(150),
        }
    }
}

/// Slowest lamp sampling that still sees every half-second blink twice.
const MAX_STATUS_INTERVAL: Duration = Duration::from_millis(250);

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

/// Serializes a `Duration` as fractional seconds.
mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        WhiteLightConfig::new("chiller.local", 4001).validate().unwrap();
    }

    #[test]
    fn missing_chiller_section_is_rejected() {
        let err = WhiteLightConfig::from_json_str("{}").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn fractional_seconds() {
        let config = WhiteLightConfig::from_json_str(
            r#"{"chiller": {"host": "h", "command_timeout": 0.25}}"#,
        )
        .unwrap();
        assert_eq!(config.chiller.command_timeout, Duration::from_millis(250));
    }

    #[test]
    fn negative_seconds_are_rejected() {
        let result =
            WhiteLightConfig::from_json_str(r#"{"chiller": {"host": "h", "command_timeout": -1}}"#);
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn initial_temperature_must_be_in_warning_band() {
        let config = WhiteLightConfig::new("h", 1)
            .with_chiller(ChillerConfig::new("h", 1).with_initial_temperature(40.0));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("initial_temperature=40"));
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let mut chiller = ChillerConfig::new("h", 1);
        chiller.low_supply_temperature_alarm = 35.0;
        assert!(WhiteLightConfig::new("h", 1).with_chiller(chiller).validate().is_err());
    }

    #[test]
    fn default_power_out_of_band_is_rejected() {
        let result = WhiteLightConfig::from_json_str(
            r#"{"chiller": {"host": "h"}, "lamp": {"default_power": 500}}"#,
        );
        assert!(result.is_err());

        let lamp = LampConfig::default().with_default_power(LampPower::OFF);
        assert!(WhiteLightConfig::new("h", 1).with_lamp(lamp).validate().is_err());
    }

    #[test]
    fn slow_lamp_sampling_is_rejected() {
        let lamp = LampConfig::default().with_status_interval(Duration::from_secs(1));
        let err = WhiteLightConfig::new("h", 1).with_lamp(lamp).validate().unwrap_err();
        assert!(err.to_string().contains("lamp.status_interval=1s"));

        let config = WhiteLightConfig::from_json_str(
            r#"{"chiller": {"host": "h"}, "lamp": {"status_interval": 0.1}}"#,
        )
        .unwrap();
        assert_eq!(config.lamp.status_interval, Duration::from_millis(100));
    }

    #[test]
    fn accepts_temperature_uses_warning_band() {
        let chiller = ChillerConfig::default();
        assert!(chiller.accepts_temperature(15.0));
        assert!(chiller.accepts_temperature(25.0));
        assert!(!chiller.accepts_temperature(25.1));
    }

    #[test]
    fn threshold_lookup() {
        let chiller = ChillerConfig::default();
        assert_eq!(
            chiller.threshold(ThresholdLevel::Alarm, ThresholdKind::HighSupplyTemperature),
            30.0
        );
        assert_eq!(
            chiller.threshold(ThresholdLevel::Warning, ThresholdKind::LowCoolantFlowRate),
            0.8
        );
    }

    #[test]
    fn round_trips_through_json() {
        let config = WhiteLightConfig::new("h", 1);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(WhiteLightConfig::from_json_str(&json).unwrap(), config);
    }
}
