// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Supervisor engine. Every device access happens here, under one lock.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::time::Instant;

use crate::chiller::{AlarmTracker, ChillerClient, ChillerTelemetry};
use crate::config::WhiteLightConfig;
use crate::error::{Error, IoChannelError, Result, TransportError, ValueError};
use crate::event::{EventBus, Link, WhiteLightEvent};
use crate::io::IoChannel;
use crate::lamp::{
    ChillerCondition, FaultReason, LampAction, LampBasicState, LampDriver, LampLifecycle,
    LampStatus, LifecycleState, Observation,
};
use crate::protocol::{ChillerSession, SessionState};
use crate::response::WatchdogStatus;
use crate::state::{LampStateSnapshot, StateChange, WhiteLightState};
use crate::types::{
    AlarmBits, AlarmSublevel, ChillerControllerState, ChillerRunState, LampControllerError,
    LampControllerState, LampPower, ShutterDirection, ShutterState,
};

use super::{CorrectiveAction, CycleReport, StandbyCause};

/// Time and running report of one cycle or control request.
struct Cycle {
    now: Instant,
    report: CycleReport,
}

impl Cycle {
    fn new() -> Self {
        Self {
            now: Instant::now(),
            report: CycleReport::default(),
        }
    }
}

pub(super) struct Engine<C> {
    config: WhiteLightConfig,
    client: ChillerClient,
    driver: LampDriver<C>,
    lifecycle: LampLifecycle,
    alarms: AlarmTracker,
    watchdog: Option<WatchdogStatus>,
    status: Option<LampStatus>,
    telemetry: Option<ChillerTelemetry>,
    telemetry_read_at: Option<Instant>,
    configured: bool,
    standby_pending: bool,
    io_ok: bool,
    state: Arc<RwLock<WhiteLightState>>,
    events: EventBus,
}

impl<C: IoChannel> Engine<C> {
    pub(super) fn new(
        config: WhiteLightConfig,
        session: ChillerSession,
        channel: C,
        state: Arc<RwLock<WhiteLightState>>,
        events: EventBus,
    ) -> Self {
        let now = Instant::now();
        Self {
            client: ChillerClient::new(session),
            driver: LampDriver::new(channel, config.lamp.photosensor_threshold),
            lifecycle: LampLifecycle::new(config.lamp.clone(), now),
            alarms: AlarmTracker::new(config.chiller.alarm_reset_holdoff),
            watchdog: None,
            status: None,
            telemetry: None,
            telemetry_read_at: None,
            configured: false,
            standby_pending: false,
            io_ok: true,
            config,
            state,
            events,
        }
    }

    fn condition(&self) -> ChillerCondition {
        ChillerCondition {
            connected: self.client.is_connected(),
            watchdog: self.watchdog,
        }
    }

    // =========================================================================
    // Poll cycle
    // =========================================================================

    pub(super) async fn run_cycle(&mut self) -> CycleReport {
        let mut cx = Cycle::new();
        self.poll_chiller(&mut cx).await;
        self.poll_lamp(&mut cx).await;

        cx.report.chiller_connected = self.client.is_connected();
        cx.report.lamp_state = Some(self.lifecycle.basic_state());
        self.publish(cx.now);
        cx.report
    }

    /// Samples the lamp inputs between chiller polls, using the last
    /// chiller condition.
    pub(super) async fn sample_lamp(&mut self) {
        let mut cx = Cycle::new();
        self.poll_lamp(&mut cx).await;
        self.publish(cx.now);
    }

    async fn poll_chiller(&mut self, cx: &mut Cycle) {
        if !self.ensure_connected(cx).await {
            return;
        }

        let status = match self.client.watchdog().await {
            Ok(status) => status,
            Err(err) if err.is_transport() => {
                self.chiller_failed(err, "watchdog", cx).await;
                return;
            }
            Err(err) => {
                self.watchdog_unreadable(&err, cx).await;
                return;
            }
        };
        tracing::debug!(
            state = %status.controller_state,
            pump_running = status.pump_running,
            alarms = status.alarms_present,
            warnings = status.warnings_present,
            "Chiller watchdog"
        );
        self.watchdog = Some(status);
        cx.report.watchdog = Some(status);
        let onset = self.alarms.note_watchdog(status.alarms_present, cx.now);

        // Standby goes out before any other corrective command
        let reassert = self.standby_pending;
        let cause = if status.alarms_present
            && (onset || reassert || status.controller_state == ChillerControllerState::Run)
        {
            Some(StandbyCause::Alarm)
        } else if reassert && status.controller_state == ChillerControllerState::Standby {
            tracing::debug!("Chiller already in standby");
            self.standby_pending = false;
            None
        } else if reassert {
            Some(StandbyCause::Reassert)
        } else {
            None
        };
        if let Some(cause) = cause {
            let follow_up = self.standby(cause, cx).await;
            if !self.client.is_connected() {
                self.apply(follow_up, cx).await;
                return;
            }
        }

        if status.alarms_present && !self.read_alarms(cx).await {
            return;
        }

        let warnings = if status.warnings_present {
            match self.client.read_warnings().await {
                Ok(bits) => bits,
                Err(err) => {
                    if !self.chiller_failed(err, "warnings", cx).await {
                        return;
                    }
                    self.alarms.current().warnings
                }
            }
        } else {
            AlarmBits::default()
        };
        self.alarms.record_warnings(warnings);

        let interval = self.config.chiller.telemetry_interval;
        let due = self
            .telemetry_read_at
            .is_none_or(|at| cx.now.saturating_duration_since(at) >= interval);
        if due {
            self.telemetry_read_at = Some(cx.now);
            match self.client.read_telemetry().await {
                Ok(telemetry) => {
                    self.telemetry = Some(telemetry);
                    cx.report.telemetry_read = true;
                }
                Err(err) => {
                    self.chiller_failed(err, "telemetry", cx).await;
                }
            }
        }
    }

    /// Reads both level-2 registers, then the consuming level-1 read if it
    /// is due. Returns `false` if the link failed.
    async fn read_alarms(&mut self, cx: &mut Cycle) -> bool {
        for sublevel in [AlarmSublevel::One, AlarmSublevel::Two] {
            match self.client.read_l2_alarms(sublevel).await {
                Ok(bits) => self.alarms.record_l2(sublevel, bits),
                Err(err) => {
                    if !self.chiller_failed(err, "level-2 alarms", cx).await {
                        return false;
                    }
                }
            }
        }

        if !self.alarms.l1_read_due(cx.now) {
            return true;
        }
        match self.client.read_l1_alarms().await {
            Ok(level1) => {
                let new = self.alarms.record_l1(level1, cx.now);
                cx.report.level1_read = Some(level1);
                if !new.is_empty() {
                    self.events
                        .publish(WhiteLightEvent::ChillerAlarmsRead { level1, new });
                }
                true
            }
            Err(err) => self.chiller_failed(err, "level-1 alarms", cx).await,
        }
    }

    /// Reconnects and configures the chiller if needed. Returns `true` if
    /// commands may be sent.
    async fn ensure_connected(&mut self, cx: &mut Cycle) -> bool {
        if !self.client.is_connected() {
            if let Err(err) = self.client.reset().await {
                tracing::warn!(error = %err, "Chiller reconnect failed");
                return false;
            }
            self.events.publish(WhiteLightEvent::connected(Link::Chiller));
            self.configured = false;
        }
        if self.configured {
            return true;
        }
        match self.configure().await {
            Ok(()) => true,
            Err(err) if err.is_transport() => self.chiller_failed(err, "configure", cx).await,
            Err(err) => {
                tracing::error!(error = %err, "Chiller rejected its configuration");
                self.configured = true;
                true
            }
        }
    }

    pub(super) async fn configure(&mut self) -> Result<()> {
        let mut chiller = self.config.chiller.clone();
        if let Some(celsius) = self.client.set_temperature() {
            chiller.initial_temperature = celsius;
        }
        self.client.configure(&chiller).await?;
        self.configured = true;
        Ok(())
    }

    async fn poll_lamp(&mut self, cx: &mut Cycle) {
        let status = match self.driver.read_status(cx.now) {
            Ok(status) => status,
            Err(err) => {
                self.io_failed(&err, cx).await;
                return;
            }
        };
        if !self.io_ok {
            tracing::info!("Lamp I/O restored");
            self.io_ok = true;
            self.events.publish(WhiteLightEvent::connected(Link::LampIo));
        }
        self.status = Some(status);

        let observation = Observation {
            chiller: self.condition(),
            lamp: status,
        };
        let actions = self.lifecycle.observe(observation, cx.now);
        self.apply(actions, cx).await;
    }

    // =========================================================================
    // Failures and actions
    // =========================================================================

    /// Handles a failed chiller request. Transport failures fault the lamp.
    /// Returns `true` if the link is still usable.
    async fn chiller_failed(&mut self, err: Error, what: &str, cx: &mut Cycle) -> bool {
        if !err.is_transport() {
            tracing::warn!(error = %err, request = what, "Chiller request failed");
            return true;
        }
        let actions = self.link_lost(&err, cx.now);
        self.apply(actions, cx).await;
        false
    }

    /// Drops the last watchdog after a reply that could not be used, and
    /// faults a powered lamp. The link itself stays up.
    async fn watchdog_unreadable(&mut self, err: &Error, cx: &mut Cycle) {
        tracing::error!(error = %err, "Chiller watchdog unreadable");
        self.watchdog = None;
        if !self.lifecycle.commanded_power().is_on() {
            return;
        }
        let actions = self.lifecycle.fault(
            FaultReason::ChillerLink(format!("watchdog unreadable: {err}")),
            cx.now,
        );
        self.apply(actions, cx).await;
    }

    fn link_lost(&mut self, err: &Error, now: Instant) -> Vec<LampAction> {
        let message = err.to_string();
        tracing::error!(error = %message, "Chiller link lost");
        self.watchdog = None;
        self.events
            .publish(WhiteLightEvent::disconnected(Link::Chiller, message.clone()));
        self.lifecycle.fault(FaultReason::ChillerLink(message), now)
    }

    async fn io_failed(&mut self, err: &IoChannelError, cx: &mut Cycle) {
        let message = err.to_string();
        tracing::error!(error = %message, "Lamp I/O failed");
        if self.io_ok {
            self.io_ok = false;
            self.events
                .publish(WhiteLightEvent::disconnected(Link::LampIo, message.clone()));
        }
        let actions = self
            .lifecycle
            .fault(FaultReason::IoChannel(message), cx.now);
        self.apply(actions, cx).await;
    }

    /// Carries out lifecycle actions in order, including any follow-up a
    /// failing action causes.
    async fn apply(&mut self, actions: Vec<LampAction>, cx: &mut Cycle) {
        let mut queue = VecDeque::from(actions);
        while let Some(action) = queue.pop_front() {
            match action {
                LampAction::SetPower(power) => match self.driver.set_power(power) {
                    Ok(()) => {
                        let corrective = matches!(
                            self.lifecycle.basic_state(),
                            LampBasicState::Fault | LampBasicState::CooldownPendingRetry
                        );
                        if corrective && !power.is_on() {
                            self.corrective(CorrectiveAction::LampOff, cx);
                        }
                    }
                    Err(err) => {
                        tracing::error!(error = %err, power = %power, "Could not set lamp power");
                        queue.extend(
                            self.lifecycle
                                .fault(FaultReason::IoChannel(err.to_string()), cx.now),
                        );
                    }
                },
                LampAction::ChillerStandby => {
                    let follow_up = self.standby(StandbyCause::LampFault, cx).await;
                    queue.extend(follow_up);
                }
            }
        }

        if let Some(period) = self.lifecycle.take_finished_on_period() {
            let hours = period.as_secs_f64() / 3600.0;
            let total_hours = self.lifecycle.total_on_time().as_secs_f64() / 3600.0;
            tracing::info!(hours, total_hours, "Lamp powered off");
            self.events
                .publish(WhiteLightEvent::LampOnHours { hours, total_hours });
        }
    }

    /// Commands chiller standby once per cycle. Returns the actions caused
    /// by a link failure, if any.
    async fn standby(&mut self, cause: StandbyCause, cx: &mut Cycle) -> Vec<LampAction> {
        if cx.report.standby_sent() {
            return Vec::new();
        }
        if !self.client.is_connected() {
            tracing::warn!(cause = ?cause, "Chiller unreachable; standby deferred");
            self.standby_pending = true;
            return Vec::new();
        }
        match self.client.set_status(ChillerRunState::Standby).await {
            Ok(()) => {
                tracing::warn!(cause = ?cause, "Chiller commanded to standby");
                self.standby_pending = false;
                self.corrective(CorrectiveAction::ChillerStandby(cause), cx);
                Vec::new()
            }
            Err(err) => {
                tracing::error!(error = %err, cause = ?cause, "Chiller standby failed");
                self.standby_pending = true;
                if err.is_transport() {
                    self.link_lost(&err, cx.now)
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn corrective(&self, action: CorrectiveAction, cx: &mut Cycle) {
        cx.report.corrective.push(action);
        self.events.publish(WhiteLightEvent::Corrective(action));
    }

    /// Refuses chiller commands while the session is down. The poll cycle
    /// reconnects.
    fn require_chiller(&self) -> Result<()> {
        match self.client.session().state() {
            SessionState::Connected => Ok(()),
            SessionState::Invalid => Err(TransportError::Invalid(
                "waiting for the supervisor to reconnect".to_string(),
            )
            .into()),
            SessionState::Disconnected => Err(TransportError::Disconnected.into()),
        }
    }

    /// Faults the lamp on a transport failure, then hands the result back.
    async fn check<T>(&mut self, result: Result<T>, cx: &mut Cycle) -> Result<T> {
        if let Err(err) = &result
            && err.is_transport()
        {
            let actions = self.link_lost(err, cx.now);
            self.apply(actions, cx).await;
        }
        result
    }

    // =========================================================================
    // Control requests
    // =========================================================================

    pub(super) async fn turn_lamp_on(&mut self, power: Option<LampPower>) -> Result<()> {
        let mut cx = Cycle::new();
        let power = power.unwrap_or(self.config.lamp.default_power);

        // Decide on a fresh watchdog when the link allows it
        if self.client.is_connected() {
            let result = self.client.watchdog().await;
            match self.check(result, &mut cx).await {
                Ok(status) => self.watchdog = Some(status),
                Err(err) => {
                    if !err.is_transport() {
                        tracing::warn!(error = %err, "Watchdog before turn-on failed");
                        self.watchdog = None;
                    }
                    self.publish(cx.now);
                    return Err(err);
                }
            }
        }

        let condition = self.condition();
        let actions = self.lifecycle.request_on(power, &condition, cx.now)?;
        self.apply(actions, &mut cx).await;
        self.publish(cx.now);
        match self.lifecycle.state() {
            LifecycleState::Fault { reason, .. } => Err(reason.to_error()),
            _ => Ok(()),
        }
    }

    pub(super) async fn turn_lamp_off(&mut self, force: bool) -> Result<()> {
        let mut cx = Cycle::new();
        let actions = self.lifecycle.request_off(force, cx.now)?;
        self.apply(actions, &mut cx).await;
        self.publish(cx.now);
        Ok(())
    }

    pub(super) async fn set_chiller_status(
        &mut self,
        state: ChillerRunState,
    ) -> Result<WatchdogStatus> {
        if state == ChillerRunState::Standby {
            self.lifecycle.can_stop_chiller()?;
        }
        self.require_chiller()?;
        let mut cx = Cycle::new();

        let result = self.client.set_status(state).await;
        self.check(result, &mut cx).await?;
        if state == ChillerRunState::Standby {
            self.standby_pending = false;
        }
        let result = self.client.watchdog().await;
        let status = self.check(result, &mut cx).await?;
        self.watchdog = Some(status);
        self.publish(cx.now);
        Ok(status)
    }

    pub(super) async fn set_chiller_temperature(&mut self, celsius: f64) -> Result<()> {
        let chiller = &self.config.chiller;
        if !chiller.accepts_temperature(celsius) {
            return Err(ValueError::TemperatureOutOfRange {
                min: chiller.low_supply_temperature_warning,
                max: chiller.high_supply_temperature_warning,
                value: celsius,
            }
            .into());
        }
        self.require_chiller()?;
        let mut cx = Cycle::new();
        let result = self.client.set_control_temperature(celsius).await;
        self.check(result, &mut cx).await?;
        self.publish(cx.now);
        Ok(())
    }

    pub(super) fn clear_fault(&mut self) -> Result<()> {
        let now = Instant::now();
        self.lifecycle.clear_fault(now)?;
        self.alarms.clear_latched();
        self.publish(now);
        Ok(())
    }

    // =========================================================================
    // Shutter
    // =========================================================================

    /// Starts a shutter move. Returns the state if no move is needed.
    pub(super) fn begin_shutter(
        &mut self,
        direction: ShutterDirection,
    ) -> Result<Option<ShutterState>> {
        let state = self.read_shutter()?;
        if state == direction.target() {
            tracing::debug!(state = ?state, "Shutter already in place");
            return Ok(Some(state));
        }
        if state == ShutterState::Invalid {
            return Err(Error::SafetyViolation(
                "both shutter limit switches are active".to_string(),
            ));
        }
        if let Err(err) = self.driver.set_shutter(direction) {
            self.end_shutter();
            return Err(err.into());
        }
        tracing::info!(target_state = direction.label(), "Moving shutter");
        Ok(None)
    }

    pub(super) fn read_shutter(&mut self) -> std::result::Result<ShutterState, IoChannelError> {
        let state = self.driver.read_shutter()?;
        if let Some(status) = &mut self.status {
            status.shutter = state;
        }
        Ok(state)
    }

    /// Stops the shutter motor and publishes the final position.
    pub(super) fn end_shutter(&mut self) {
        if let Err(err) = self.driver.disable_shutter() {
            tracing::error!(error = %err, "Could not disable shutter motor");
        }
        self.publish(Instant::now());
    }

    // =========================================================================
    // Publishing
    // =========================================================================

    fn lamp_snapshot(&self, now: Instant) -> LampStateSnapshot {
        let status = self.status.as_ref();
        let cooling_down = !self.lifecycle.remaining_cooldown(now).is_zero();
        LampStateSnapshot {
            basic_state: self.lifecycle.basic_state(),
            controller_state: status.map_or(LampControllerState::Unknown, |s| s.controller_state),
            controller_error: status.map_or(LampControllerError::None, |s| s.controller_error),
            power: self.lifecycle.commanded_power(),
            light_detected: status.is_some_and(|s| s.light_detected),
            shutter: status.map_or(ShutterState::Unknown, |s| s.shutter),
            warmup_end: self.lifecycle.warmup_end(),
            cooldown_end: self.lifecycle.cooldown_end().filter(|_| cooling_down),
            fault: match self.lifecycle.state() {
                LifecycleState::Fault { reason, .. } => Some(reason.clone()),
                _ => None,
            },
        }
    }

    /// Applies the current readings to the shared state and publishes what
    /// changed.
    fn publish(&self, now: Instant) {
        let mut changes = vec![
            StateChange::Lamp(self.lamp_snapshot(now)),
            StateChange::ChillerConnected(self.client.is_connected()),
            StateChange::Alarms(self.alarms.current()),
        ];
        changes.extend(self.watchdog.map(StateChange::Watchdog));
        changes.extend(self.client.set_temperature().map(StateChange::SetTemperature));
        changes.extend(self.telemetry.map(StateChange::Telemetry));

        for change in changes {
            let mut state = self.state.write();
            let was_fault = state.lamp().fault.is_some();
            if !state.apply(&change) {
                continue;
            }
            let new_state = state.clone();
            drop(state);

            if let StateChange::Lamp(lamp) = &change
                && !was_fault
                && let Some(reason) = &lamp.fault
            {
                self.events.publish(WhiteLightEvent::LampFault {
                    reason: reason.clone(),
                });
            }
            self.events
                .publish(WhiteLightEvent::StateChanged { change, new_state });
        }
    }
}
