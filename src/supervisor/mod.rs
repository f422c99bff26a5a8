// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Supervisor for the lamp and chiller.
//!
//! The [`Supervisor`] owns the chiller session, the lamp driver and the
//! lamp lifecycle behind a single async mutex. The poll cycle and every
//! control request take that lock, so requests queue behind an in-flight
//! cycle and never overlap an outstanding chiller command.
//!
//! Each cycle:
//!
//! 1. reconnects and reconfigures the chiller if the session is down;
//! 2. reads the watchdog;
//! 3. commands standby if alarms are reported, before anything else;
//! 4. reads the level-2 alarms, then the consuming level-1 read once the
//!    holdoff has passed;
//! 5. reads warnings, and telemetry when its interval has elapsed;
//! 6. samples the lamp inputs, which [`Supervisor::run`] also does every
//!    `status_interval` between cycles for the blink decoder;
//! 7. feeds everything to the [`LampLifecycle`](crate::lamp::LampLifecycle)
//!    and carries out the actions it returns;
//! 8. publishes the new state.
//!
//! # Examples
//!
//! ```no_run
//! use atwhitelight::config::WhiteLightConfig;
//! use atwhitelight::io::MemoryIoChannel;
//! use atwhitelight::supervisor::Supervisor;
//! use tokio::sync::watch;
//!
//! # async fn example() -> atwhitelight::Result<()> {
//! let config = WhiteLightConfig::new("192.168.1.40", 4001);
//! let supervisor = Supervisor::connect(config, MemoryIoChannel::new()).await?;
//!
//! let (stop_tx, stop_rx) = watch::channel(false);
//! let runner = supervisor.clone();
//! let task = tokio::spawn(async move { runner.run(stop_rx).await });
//!
//! supervisor.start_chiller().await?;
//! supervisor.turn_lamp_on(None).await?;
//!
//! stop_tx.send(true).ok();
//! task.await.ok();
//! # Ok(())
//! # }
//! ```

mod engine;
mod report;

pub use report::{CorrectiveAction, CycleReport, StandbyCause};

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::WhiteLightConfig;
use crate::error::{IoChannelError, Result};
use crate::event::{EventBus, WhiteLightEvent};
use crate::io::IoChannel;
use crate::protocol::ChillerSession;
use crate::response::WatchdogStatus;
use crate::state::{LampStateSnapshot, WhiteLightState};
use crate::types::{ChillerRunState, LampPower, ShutterDirection, ShutterState};

use self::engine::Engine;

/// How often the limit switches are polled during a shutter move.
const SHUTTER_POLL_INTERVAL: Duration = Duration::from_millis(150);

/// Control handle for the white-light source.
///
/// Cloning is cheap; clones share the same hardware and state.
pub struct Supervisor<C> {
    engine: Arc<Mutex<Engine<C>>>,
    shutter: Arc<Mutex<()>>,
    state: Arc<RwLock<WhiteLightState>>,
    events: EventBus,
    config: Arc<WhiteLightConfig>,
}

impl<C> Clone for Supervisor<C> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            shutter: Arc::clone(&self.shutter),
            state: Arc::clone(&self.state),
            events: self.events.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<C> std::fmt::Debug for Supervisor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("state", &*self.state.read())
            .field("subscribers", &self.events.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl<C: IoChannel> Supervisor<C> {
    /// Creates a supervisor over an existing chiller session.
    ///
    /// The chiller is configured on the first cycle, or earlier through
    /// [`configure_chiller`](Self::configure_chiller).
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is invalid.
    pub fn new(config: WhiteLightConfig, session: ChillerSession, channel: C) -> Result<Self> {
        config.validate()?;
        let state = Arc::new(RwLock::new(WhiteLightState::default()));
        let events = EventBus::new();
        let engine = Engine::new(
            config.clone(),
            session,
            channel,
            Arc::clone(&state),
            events.clone(),
        );
        Ok(Self {
            engine: Arc::new(Mutex::new(engine)),
            shutter: Arc::new(Mutex::new(())),
            state,
            events,
            config: Arc::new(config),
        })
    }

    /// Dials the chiller and creates a supervisor.
    ///
    /// An unreachable chiller is not an error: the supervisor starts
    /// disconnected and the poll cycle keeps trying.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is invalid.
    pub async fn connect(config: WhiteLightConfig, channel: C) -> Result<Self> {
        config.validate()?;
        let session = match ChillerSession::connect(&config.chiller).await {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = %err, "Chiller unreachable; starting disconnected");
                ChillerSession::disconnected(&config.chiller)
            }
        };
        Self::new(config, session, channel)
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &WhiteLightConfig {
        &self.config
    }

    // =========================================================================
    // State and events
    // =========================================================================

    /// Subscribes to supervisor events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WhiteLightEvent> {
        self.events.subscribe()
    }

    /// Returns the last published state.
    ///
    /// Never waits for the poll cycle.
    #[must_use]
    pub fn state(&self) -> WhiteLightState {
        self.state.read().clone()
    }

    /// Returns the last published lamp state.
    #[must_use]
    pub fn lamp_state(&self) -> LampStateSnapshot {
        self.state.read().lamp().clone()
    }

    // =========================================================================
    // Poll loop
    // =========================================================================

    /// Runs one poll cycle.
    pub async fn run_cycle(&self) -> CycleReport {
        self.engine.lock().await.run_cycle().await
    }

    /// Runs poll cycles every `watchdog_interval`, and samples the lamp
    /// inputs every `status_interval` in between, until `shutdown` turns
    /// true or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        if *shutdown.borrow() {
            return;
        }
        let period = self.config.chiller.watchdog_interval;
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let status_period = self.config.lamp.status_interval;
        let mut status_ticker =
            tokio::time::interval_at(Instant::now() + status_period, status_period);
        status_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(
            period_s = period.as_secs_f64(),
            status_period_s = status_period.as_secs_f64(),
            "Supervisor loop started"
        );

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
                _ = status_ticker.tick() => {
                    self.engine.lock().await.sample_lamp().await;
                }
            }
        }
        tracing::info!("Supervisor loop stopped");
    }

    /// Writes the control temperature and every threshold to the chiller.
    ///
    /// # Errors
    ///
    /// Returns the first failing command's error.
    pub async fn configure_chiller(&self) -> Result<()> {
        self.engine.lock().await.configure().await
    }

    // =========================================================================
    // Lamp
    // =========================================================================

    /// Turns the lamp on at `power`, or at `default_power` if `None`.
    /// While already on, changes the power.
    ///
    /// # Errors
    ///
    /// - `Error::Value` for zero power.
    /// - `Error::SafetyViolation` if the chiller is not connected, running
    ///   with its pump on and free of alarms, or the lamp is cooling down,
    ///   waiting to retry or faulted.
    /// - The fault's error if writing the power output faulted the lamp.
    pub async fn turn_lamp_on(&self, power: Option<LampPower>) -> Result<()> {
        self.engine.lock().await.turn_lamp_on(power).await
    }

    /// Turns the lamp off.
    ///
    /// # Errors
    ///
    /// Returns `Error::SafetyViolation` if `force` is false and the warmup
    /// period has not elapsed.
    pub async fn turn_lamp_off(&self, force: bool) -> Result<()> {
        self.engine.lock().await.turn_lamp_off(force).await
    }

    /// Clears a lamp fault.
    ///
    /// # Errors
    ///
    /// Returns `Error::SafetyViolation` while the lamp controller reports
    /// an error or the chiller reports alarms.
    pub async fn clear_fault(&self) -> Result<()> {
        self.engine.lock().await.clear_fault()
    }

    // =========================================================================
    // Chiller
    // =========================================================================

    /// Starts the chiller and returns the confirming watchdog.
    ///
    /// # Errors
    ///
    /// Returns an error if the chiller is unreachable or rejects the
    /// command.
    pub async fn start_chiller(&self) -> Result<WatchdogStatus> {
        self.engine
            .lock()
            .await
            .set_chiller_status(ChillerRunState::Run)
            .await
    }

    /// Puts the chiller in standby and returns the confirming watchdog.
    ///
    /// # Errors
    ///
    /// Returns `Error::SafetyViolation` unless the lamp is OFF or FAULT,
    /// or an error if the chiller is unreachable or rejects the command.
    pub async fn stop_chiller(&self) -> Result<WatchdogStatus> {
        self.engine
            .lock()
            .await
            .set_chiller_status(ChillerRunState::Standby)
            .await
    }

    /// Sets the chiller control temperature.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::TemperatureOutOfRange` outside the supply
    /// temperature warning band, or an error if the chiller is unreachable
    /// or rejects the command.
    pub async fn set_chiller_temperature(&self, celsius: f64) -> Result<()> {
        self.engine
            .lock()
            .await
            .set_chiller_temperature(celsius)
            .await
    }

    // =========================================================================
    // Shutter
    // =========================================================================

    /// Opens the shutter.
    ///
    /// # Errors
    ///
    /// See [`close_shutter`](Self::close_shutter).
    pub async fn open_shutter(&self) -> Result<ShutterState> {
        self.move_shutter(ShutterDirection::Open).await
    }

    /// Closes the shutter.
    ///
    /// Returns at once if the shutter is already closed. The motor is
    /// always disabled when the move ends.
    ///
    /// # Errors
    ///
    /// - `Error::SafetyViolation` if both limit switches are active.
    /// - `IoChannelError::ShutterTimeout` if the limit switch is not
    ///   reached within `shutter_timeout`.
    /// - `Error::IoChannel` if a line cannot be read or written.
    pub async fn close_shutter(&self) -> Result<ShutterState> {
        self.move_shutter(ShutterDirection::Close).await
    }

    async fn move_shutter(&self, direction: ShutterDirection) -> Result<ShutterState> {
        let _moving = self.shutter.lock().await;
        if let Some(state) = self.engine.lock().await.begin_shutter(direction)? {
            return Ok(state);
        }

        let timeout = self.config.lamp.shutter_timeout;
        let deadline = Instant::now() + timeout;
        // The engine lock is released between polls so the cycle keeps running
        let result = loop {
            tokio::time::sleep(SHUTTER_POLL_INTERVAL).await;
            let mut engine = self.engine.lock().await;
            match engine.read_shutter() {
                Ok(state) if state == direction.target() => break Ok(state),
                Ok(_) if Instant::now() >= deadline => {
                    #[allow(clippy::cast_possible_truncation)]
                    let timeout_ms = timeout.as_millis() as u64;
                    break Err(IoChannelError::ShutterTimeout {
                        target: direction.label(),
                        timeout_ms,
                    }
                    .into());
                }
                Ok(_) => {}
                Err(err) => break Err(err.into()),
            }
        };

        self.engine.lock().await.end_shutter();
        match &result {
            Ok(state) => tracing::info!(state = ?state, "Shutter move complete"),
            Err(err) => tracing::error!(error = %err, "Shutter move failed"),
        }
        result
    }
}
