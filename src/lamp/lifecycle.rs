// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lamp lifecycle state machine.
//!
//! ```text
//!            turn on                 warmup elapsed + lit
//!   OFF ─────────────────▶ WARMUP ─────────────────────────▶ ON
//!    ▲                      │  ▲                              │
//!    │          not lit in  │  │ retry_sleep                  │ turn off
//!    │     max_lamp_on_delay│  │ elapsed                      │
//!    │                      ▼  │                              ▼
//!    │            COOLDOWN_PENDING_RETRY ──── turn off ────▶ COOLDOWN
//!    │                                                        │
//!    └──────────────────── cooldown elapsed ◀─────────────────┘
//!
//!   any state ──── fault ────▶ FAULT ──── clear_fault ────▶ COOLDOWN or OFF
//! ```
//!
//! The machine performs no I/O. Each method takes the current time and
//! returns the [`LampAction`]s the caller must apply, in order. Requests
//! that break the safety policy return [`Error::SafetyViolation`] and
//! change nothing.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::LampConfig;
use crate::error::{Error, Result, ValueError};
use crate::response::WatchdogStatus;
use crate::types::{
    ChillerControllerState, LampControllerError, LampControllerState, LampPower,
};

use super::LampStatus;

/// Coarse lifecycle state, as published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LampBasicState {
    /// Lamp off and cool.
    Off,
    /// Lamp powered, igniting or inside the minimum on-time.
    Warmup,
    /// Lamp lit.
    On,
    /// Ignition failed; power off and waiting to retry.
    CooldownPendingRetry,
    /// Lamp off, inside the minimum off-time.
    Cooldown,
    /// A fault forced the lamp off. Requires `clear_fault`.
    Fault,
}

impl fmt::Display for LampBasicState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Off => "OFF",
            Self::Warmup => "WARMUP",
            Self::On => "ON",
            Self::CooldownPendingRetry => "COOLDOWN_PENDING_RETRY",
            Self::Cooldown => "COOLDOWN",
            Self::Fault => "FAULT",
        };
        f.write_str(text)
    }
}

/// Monotonic and wall-clock time of a state entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    /// Monotonic time, used for every timer.
    pub instant: Instant,
    /// Wall-clock time, used for reporting.
    pub wall: DateTime<Utc>,
}

impl Stamp {
    /// Stamps `instant`, deriving the wall-clock time from the current
    /// wall clock.
    #[must_use]
    pub fn at(instant: Instant) -> Self {
        let behind = Instant::now().saturating_duration_since(instant);
        let wall = chrono::Duration::from_std(behind)
            .ok()
            .and_then(|behind| Utc::now().checked_sub_signed(behind))
            .unwrap_or_else(Utc::now);
        Self { instant, wall }
    }

    /// Returns the wall-clock time `after` this stamp.
    #[must_use]
    pub fn wall_after(&self, after: Duration) -> DateTime<Utc> {
        chrono::Duration::from_std(after)
            .ok()
            .and_then(|after| self.wall.checked_add_signed(after))
            .unwrap_or(self.wall)
    }
}

/// Why the lifecycle entered FAULT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultReason {
    /// Every ignition attempt failed.
    IgnitionFailure {
        /// Attempts made.
        attempts: u32,
    },
    /// The lamp went dark while it should be lit.
    LightLost,
    /// The lamp is lit while it should be dark.
    UnexpectedlyLit,
    /// The power output disagrees with the commanded power.
    PowerMismatch {
        /// Commanded power is non-zero.
        commanded_on: bool,
        /// Read-back output is energized.
        energized: bool,
    },
    /// The lamp controller reports an error.
    LampController(LampControllerError),
    /// The chiller reports alarms.
    ChillerAlarm,
    /// The chiller is not cooling while the lamp is powered.
    ChillerNotCooling {
        /// Reported controller state.
        state: ChillerControllerState,
        /// Reported pump state.
        pump_running: bool,
    },
    /// The chiller link failed.
    ChillerLink(String),
    /// The lamp I/O module failed.
    IoChannel(String),
}

impl FaultReason {
    /// Converts the reason into the matching error.
    #[must_use]
    pub fn to_error(&self) -> Error {
        match self {
            Self::IgnitionFailure { attempts } => Error::IgnitionFailure {
                attempts: *attempts,
            },
            other => Error::StateMismatch(other.to_string()),
        }
    }
}

impl fmt::Display for FaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IgnitionFailure { attempts } => {
                write!(f, "lamp failed to ignite after {attempts} attempts")
            }
            Self::LightLost => f.write_str("lamp went dark while powered"),
            Self::UnexpectedlyLit => f.write_str("lamp is lit while unpowered"),
            Self::PowerMismatch {
                commanded_on,
                energized,
            } => write!(
                f,
                "power output energized={energized} but commanded on={commanded_on}"
            ),
            Self::LampController(error) => write!(f, "lamp controller error: {error}"),
            Self::ChillerAlarm => f.write_str("chiller reports alarms"),
            Self::ChillerNotCooling {
                state,
                pump_running,
            } => write!(
                f,
                "chiller not cooling: state={state}, pump running={pump_running}"
            ),
            Self::ChillerLink(message) => write!(f, "chiller link failed: {message}"),
            Self::IoChannel(message) => write!(f, "lamp I/O failed: {message}"),
        }
    }
}

/// Lifecycle state with entry stamps.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleState {
    /// Off and cool.
    Off {
        /// Entry.
        since: Stamp,
    },
    /// Powered, igniting or warming up.
    Warmup {
        /// Entry; power was applied at this time.
        since: Stamp,
        /// Commanded power.
        power: LampPower,
        /// Ignition attempt, starting at 1.
        attempt: u32,
        /// Light has been seen during this attempt.
        lit: bool,
    },
    /// Lit.
    On {
        /// Entry.
        since: Stamp,
        /// Time power was applied for the successful attempt.
        powered_at: Stamp,
        /// Commanded power.
        power: LampPower,
    },
    /// Waiting to retry ignition with power off.
    CooldownPendingRetry {
        /// Entry; power was removed at this time.
        since: Stamp,
        /// Power to retry with.
        power: LampPower,
        /// The attempt that failed.
        attempt: u32,
    },
    /// Off, inside the minimum off-time.
    Cooldown {
        /// Entry.
        since: Stamp,
    },
    /// Faulted.
    Fault {
        /// Entry.
        since: Stamp,
        /// Cause.
        reason: FaultReason,
    },
}

impl LifecycleState {
    /// Returns the coarse state.
    #[must_use]
    pub fn basic(&self) -> LampBasicState {
        match self {
            Self::Off { .. } => LampBasicState::Off,
            Self::Warmup { .. } => LampBasicState::Warmup,
            Self::On { .. } => LampBasicState::On,
            Self::CooldownPendingRetry { .. } => LampBasicState::CooldownPendingRetry,
            Self::Cooldown { .. } => LampBasicState::Cooldown,
            Self::Fault { .. } => LampBasicState::Fault,
        }
    }

    /// Returns the entry stamp.
    #[must_use]
    pub fn since(&self) -> Stamp {
        match self {
            Self::Off { since }
            | Self::Warmup { since, .. }
            | Self::On { since, .. }
            | Self::CooldownPendingRetry { since, .. }
            | Self::Cooldown { since }
            | Self::Fault { since, .. } => *since,
        }
    }

    /// Returns the power the lamp output should be driving.
    ///
    /// Non-zero only in WARMUP and ON.
    #[must_use]
    pub fn commanded_power(&self) -> LampPower {
        match self {
            Self::Warmup { power, .. } | Self::On { power, .. } => *power,
            _ => LampPower::OFF,
        }
    }
}

/// Something the caller must do to the hardware.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LampAction {
    /// Drive the lamp power output.
    SetPower(LampPower),
    /// Command the chiller to standby.
    ChillerStandby,
}

/// What the supervisor knows about the chiller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChillerCondition {
    /// The session is connected.
    pub connected: bool,
    /// Latest watchdog reply, if any.
    pub watchdog: Option<WatchdogStatus>,
}

impl ChillerCondition {
    /// A chiller that has never been reached.
    pub const UNKNOWN: Self = Self {
        connected: false,
        watchdog: None,
    };

    /// Returns `true` if alarms are reported.
    #[must_use]
    pub fn alarms_present(&self) -> bool {
        self.watchdog.is_some_and(|w| w.alarms_present)
    }

    /// Returns why the lamp may not be powered, if anything.
    #[must_use]
    pub fn lamp_blocker(&self) -> Option<String> {
        if !self.connected {
            return Some("chiller is not connected".to_string());
        }
        let Some(watchdog) = self.watchdog else {
            return Some("chiller status has not been read".to_string());
        };
        if watchdog.alarms_present {
            Some("chiller reports alarms".to_string())
        } else if watchdog.controller_state != ChillerControllerState::Run {
            Some(format!(
                "chiller state is {}, not Run",
                watchdog.controller_state
            ))
        } else if !watchdog.pump_running {
            Some("chiller pump is not running".to_string())
        } else {
            None
        }
    }
}

/// One supervisor cycle's worth of observations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Chiller condition.
    pub chiller: ChillerCondition,
    /// Lamp inputs.
    pub lamp: LampStatus,
}

/// Lamp lifecycle.
#[derive(Debug, Clone)]
pub struct LampLifecycle {
    config: LampConfig,
    state: LifecycleState,
    powered_off_at: Option<Stamp>,
    total_on_time: Duration,
    finished_on_period: Option<Duration>,
    latest: Option<Observation>,
}

impl LampLifecycle {
    /// Creates a lifecycle in OFF.
    #[must_use]
    pub fn new(config: LampConfig, now: Instant) -> Self {
        Self {
            config,
            state: LifecycleState::Off {
                since: Stamp::at(now),
            },
            powered_off_at: None,
            total_on_time: Duration::ZERO,
            finished_on_period: None,
            latest: None,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    /// Returns the coarse state.
    #[must_use]
    pub fn basic_state(&self) -> LampBasicState {
        self.state.basic()
    }

    /// Returns the power the output should be driving.
    #[must_use]
    pub fn commanded_power(&self) -> LampPower {
        self.state.commanded_power()
    }

    /// Returns the latest observation.
    #[must_use]
    pub fn latest(&self) -> Option<&Observation> {
        self.latest.as_ref()
    }

    /// Returns the time power was last removed.
    #[must_use]
    pub fn powered_off_at(&self) -> Option<Stamp> {
        self.powered_off_at
    }

    /// Returns the time power was applied, while powered.
    #[must_use]
    pub fn powered_on_at(&self) -> Option<Stamp> {
        match &self.state {
            LifecycleState::Warmup { since, .. } => Some(*since),
            LifecycleState::On { powered_at, .. } => Some(*powered_at),
            _ => None,
        }
    }

    /// Returns the total time the lamp has been powered, excluding the
    /// current period.
    #[must_use]
    pub fn total_on_time(&self) -> Duration {
        self.total_on_time
    }

    /// Takes the length of the powered period that ended most recently,
    /// if it has not been taken yet.
    pub fn take_finished_on_period(&mut self) -> Option<Duration> {
        self.finished_on_period.take()
    }

    /// Returns the warmup time left, zero when not powered.
    #[must_use]
    pub fn remaining_warmup(&self, now: Instant) -> Duration {
        self.powered_on_at().map_or(Duration::ZERO, |on| {
            self.config
                .warmup_period
                .saturating_sub(now.saturating_duration_since(on.instant))
        })
    }

    /// Returns the cooldown time left since power was last removed.
    #[must_use]
    pub fn remaining_cooldown(&self, now: Instant) -> Duration {
        self.powered_off_at.map_or(Duration::ZERO, |off| {
            self.config
                .cooldown_period
                .saturating_sub(now.saturating_duration_since(off.instant))
        })
    }

    /// Wall-clock end of the warmup period, while powered.
    #[must_use]
    pub fn warmup_end(&self) -> Option<DateTime<Utc>> {
        self.powered_on_at()
            .map(|on| on.wall_after(self.config.warmup_period))
    }

    /// Wall-clock end of the cooldown period after the last power-off.
    #[must_use]
    pub fn cooldown_end(&self) -> Option<DateTime<Utc>> {
        self.powered_off_at
            .map(|off| off.wall_after(self.config.cooldown_period))
    }

    /// Requests the lamp on at `power`, or a power change if already on.
    ///
    /// # Errors
    ///
    /// - `Error::Value` if `power` is zero.
    /// - `Error::SafetyViolation` if the chiller is not ready or the state
    ///   does not permit it. Nothing changes in that case.
    pub fn request_on(
        &mut self,
        power: LampPower,
        chiller: &ChillerCondition,
        now: Instant,
    ) -> Result<Vec<LampAction>> {
        if !power.is_on() {
            return Err(ValueError::PowerOutOfRange {
                min: LampPower::MIN_ON.watts(),
                max: LampPower::MAX.watts(),
                watts: power.watts(),
            }
            .into());
        }
        match self.state.basic() {
            LampBasicState::Cooldown => {
                return Err(self.refuse(format!(
                    "lamp is cooling down; wait {:.1} s",
                    self.remaining_cooldown(now).as_secs_f64()
                )));
            }
            LampBasicState::CooldownPendingRetry => {
                return Err(self.refuse("lamp is waiting to retry ignition"));
            }
            LampBasicState::Fault => {
                return Err(self.refuse("lamp is in FAULT; clear the fault first"));
            }
            LampBasicState::Off | LampBasicState::Warmup | LampBasicState::On => {}
        }
        if let Some(blocker) = chiller.lamp_blocker() {
            return Err(self.refuse(blocker));
        }

        match &mut self.state {
            LifecycleState::Warmup { power: current, .. }
            | LifecycleState::On { power: current, .. } => {
                tracing::info!(from = %current, to = %power, "Changing lamp power");
                *current = power;
            }
            _ => {
                self.transition(
                    LifecycleState::Warmup {
                        since: Stamp::at(now),
                        power,
                        attempt: 1,
                        lit: false,
                    },
                    "turn on requested",
                );
            }
        }
        Ok(vec![LampAction::SetPower(power)])
    }

    /// Requests the lamp off.
    ///
    /// Without `force`, turning off inside the warmup period is refused.
    /// With `force`, the lamp goes to COOLDOWN immediately.
    ///
    /// # Errors
    ///
    /// Returns `Error::SafetyViolation` if warmup time remains and `force`
    /// is false.
    pub fn request_off(&mut self, force: bool, now: Instant) -> Result<Vec<LampAction>> {
        match self.state.basic() {
            LampBasicState::Off | LampBasicState::Cooldown | LampBasicState::Fault => {
                return Ok(Vec::new());
            }
            LampBasicState::CooldownPendingRetry => {
                self.transition(
                    LifecycleState::Cooldown {
                        since: Stamp::at(now),
                    },
                    "turn off requested while waiting to retry",
                );
                return Ok(Vec::new());
            }
            LampBasicState::Warmup | LampBasicState::On => {}
        }

        let remaining = self.remaining_warmup(now);
        if !remaining.is_zero() {
            if !force {
                return Err(self.refuse(format!(
                    "lamp is warming up; wait {:.1} s or force off",
                    remaining.as_secs_f64()
                )));
            }
            tracing::warn!(
                remaining_s = remaining.as_secs_f64(),
                "Forcing lamp off during warmup"
            );
        }

        self.power_off(now);
        self.transition(
            LifecycleState::Cooldown {
                since: Stamp::at(now),
            },
            "turn off requested",
        );
        Ok(vec![LampAction::SetPower(LampPower::OFF)])
    }

    /// Moves to FAULT. Returns nothing if already faulted.
    pub fn fault(&mut self, reason: FaultReason, now: Instant) -> Vec<LampAction> {
        if let LifecycleState::Fault { reason: first, .. } = &self.state {
            tracing::debug!(reason = %reason, first = %first, "Already in FAULT");
            return Vec::new();
        }
        tracing::error!(reason = %reason, state = %self.state.basic(), "Lamp FAULT");
        if self.commanded_power().is_on() {
            self.power_off(now);
        }
        self.transition(
            LifecycleState::Fault {
                since: Stamp::at(now),
                reason,
            },
            "fault",
        );
        vec![LampAction::SetPower(LampPower::OFF), LampAction::ChillerStandby]
    }

    /// Clears FAULT.
    ///
    /// Goes to COOLDOWN if cooldown time remains, otherwise to OFF.
    ///
    /// # Errors
    ///
    /// Returns `Error::SafetyViolation` if the latest observation still
    /// shows a lamp controller error or chiller alarms.
    pub fn clear_fault(&mut self, now: Instant) -> Result<()> {
        if self.state.basic() != LampBasicState::Fault {
            return Ok(());
        }
        if let Some(latest) = &self.latest {
            if latest.lamp.has_error() {
                return Err(self.refuse(format!(
                    "lamp controller still reports {}",
                    latest.lamp.controller_error
                )));
            }
            if latest.chiller.alarms_present() {
                return Err(self.refuse("chiller still reports alarms"));
            }
        }
        let since = Stamp::at(now);
        if self.remaining_cooldown(now).is_zero() {
            self.transition(LifecycleState::Off { since }, "fault cleared");
        } else {
            self.transition(LifecycleState::Cooldown { since }, "fault cleared");
        }
        Ok(())
    }

    /// Checks that the chiller may be stopped.
    ///
    /// # Errors
    ///
    /// Returns `Error::SafetyViolation` unless the state is OFF or FAULT.
    pub fn can_stop_chiller(&self) -> Result<()> {
        match self.state.basic() {
            LampBasicState::Off | LampBasicState::Fault => Ok(()),
            state => Err(self.refuse(format!("cannot stop the chiller while the lamp is {state}"))),
        }
    }

    /// Feeds one cycle's observations and advances timers.
    pub fn observe(&mut self, observation: Observation, now: Instant) -> Vec<LampAction> {
        self.latest = Some(observation);
        if self.state.basic() == LampBasicState::Fault {
            if observation.lamp.power.energized {
                tracing::warn!("Power output still energized in FAULT");
                return vec![LampAction::SetPower(LampPower::OFF)];
            }
            return Vec::new();
        }
        if let Some(reason) = self.detect_fault(&observation, now) {
            return self.fault(reason, now);
        }

        let lit = observation.lamp.light_detected;
        match self.state.clone() {
            LifecycleState::Warmup {
                since,
                power,
                attempt,
                lit: was_lit,
            } => {
                let lit = was_lit || lit;
                let on_for = now.saturating_duration_since(since.instant);
                if lit && on_for >= self.config.warmup_period {
                    self.transition(
                        LifecycleState::On {
                            since: Stamp::at(now),
                            powered_at: since,
                            power,
                        },
                        "warmup complete",
                    );
                } else if !lit && on_for >= self.config.max_lamp_on_delay {
                    return self.ignition_failed(power, attempt, now);
                } else if lit && !was_lit {
                    tracing::info!(attempt, "Lamp ignited");
                    self.state = LifecycleState::Warmup {
                        since,
                        power,
                        attempt,
                        lit,
                    };
                }
                Vec::new()
            }
            LifecycleState::CooldownPendingRetry {
                since,
                power,
                attempt,
            } => {
                if now.saturating_duration_since(since.instant) < self.config.retry_sleep {
                    return Vec::new();
                }
                if let Some(blocker) = observation.chiller.lamp_blocker() {
                    tracing::warn!(blocker = %blocker, "Cannot retry ignition");
                    return self.fault(chiller_fault(&observation.chiller), now);
                }
                self.transition(
                    LifecycleState::Warmup {
                        since: Stamp::at(now),
                        power,
                        attempt: attempt + 1,
                        lit: false,
                    },
                    "retrying ignition",
                );
                vec![LampAction::SetPower(power)]
            }
            LifecycleState::Cooldown { .. } => {
                let controller_cooling =
                    observation.lamp.controller_state == LampControllerState::Cooldown;
                if self.remaining_cooldown(now).is_zero() && !controller_cooling {
                    self.transition(
                        LifecycleState::Off {
                            since: Stamp::at(now),
                        },
                        "cooldown complete",
                    );
                }
                Vec::new()
            }
            LifecycleState::Off { .. } | LifecycleState::On { .. } | LifecycleState::Fault { .. } => {
                Vec::new()
            }
        }
    }

    fn detect_fault(&self, observation: &Observation, now: Instant) -> Option<FaultReason> {
        let lamp = &observation.lamp;
        if lamp.has_error() {
            return Some(FaultReason::LampController(lamp.controller_error));
        }
        if observation.chiller.alarms_present() {
            return Some(FaultReason::ChillerAlarm);
        }

        let commanded_on = self.commanded_power().is_on();
        if lamp.power.energized != commanded_on {
            return Some(FaultReason::PowerMismatch {
                commanded_on,
                energized: lamp.power.energized,
            });
        }

        if commanded_on && observation.chiller.lamp_blocker().is_some() {
            return Some(chiller_fault(&observation.chiller));
        }

        match &self.state {
            LifecycleState::On { .. } | LifecycleState::Warmup { lit: true, .. }
                if !lamp.light_detected =>
            {
                Some(FaultReason::LightLost)
            }
            LifecycleState::Off { .. }
            | LifecycleState::Cooldown { .. }
            | LifecycleState::CooldownPendingRetry { .. }
                if lamp.light_detected && self.dark_deadline_passed(now) =>
            {
                Some(FaultReason::UnexpectedlyLit)
            }
            _ => None,
        }
    }

    fn dark_deadline_passed(&self, now: Instant) -> bool {
        self.powered_off_at.is_none_or(|off| {
            now.saturating_duration_since(off.instant) >= self.config.max_lamp_off_delay
        })
    }

    fn ignition_failed(&mut self, power: LampPower, attempt: u32, now: Instant) -> Vec<LampAction> {
        tracing::warn!(
            attempt,
            max_retries = self.config.max_retries,
            "Lamp did not ignite"
        );
        if attempt > self.config.max_retries {
            return self.fault(FaultReason::IgnitionFailure { attempts: attempt }, now);
        }
        self.power_off(now);
        self.transition(
            LifecycleState::CooldownPendingRetry {
                since: Stamp::at(now),
                power,
                attempt,
            },
            "ignition failed",
        );
        vec![LampAction::SetPower(LampPower::OFF)]
    }

    fn power_off(&mut self, now: Instant) {
        if let Some(on) = self.powered_on_at() {
            let on_for = now.saturating_duration_since(on.instant);
            self.total_on_time += on_for;
            self.finished_on_period = Some(on_for);
        }
        self.powered_off_at = Some(Stamp::at(now));
    }

    fn transition(&mut self, next: LifecycleState, cause: &str) {
        let from = self.state.basic();
        let to = next.basic();
        self.state = next;
        if from != to {
            tracing::info!(from = %from, to = %to, cause, "Lamp state changed");
        }
    }

    fn refuse(&self, message: impl Into<String>) -> Error {
        let message = message.into();
        tracing::warn!(state = %self.state.basic(), reason = %message, "Lamp request refused");
        Error::SafetyViolation(message)
    }
}

/// Fault reason for a chiller that cannot support a powered lamp.
fn chiller_fault(chiller: &ChillerCondition) -> FaultReason {
    match chiller.watchdog {
        _ if !chiller.connected => FaultReason::ChillerLink("chiller disconnected".to_string()),
        Some(watchdog) => FaultReason::ChillerNotCooling {
            state: watchdog.controller_state,
            pump_running: watchdog.pump_running,
        },
        None => FaultReason::ChillerLink("chiller status unknown".to_string()),
    }
}
