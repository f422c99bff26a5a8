// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the supervisor against a simulated chiller and an
//! in-memory I/O module. Time is paused; timers advance explicitly.

mod common;

use std::time::Duration;

use atwhitelight::event::{Link, WhiteLightEvent};
use atwhitelight::io::{AnalogInput, AnalogOutput, DigitalInput, DigitalOutput, IoWrite};
use atwhitelight::lamp::{FaultReason, LampBasicState};
use atwhitelight::supervisor::{CorrectiveAction, StandbyCause};
use atwhitelight::types::{
    AlarmBits, ChillerControllerState, LampControllerError, LampPower, ShutterState,
};
use atwhitelight::{
    ChillerConfig, Error, IoChannelError, LampConfig, MemoryIoChannel, ProtocolError, Supervisor,
    ValueError, WhiteLightConfig,
};
use common::{Behavior, MockChiller};
use tokio::sync::{broadcast, watch};

const LIT_VOLTS: f64 = 3.0;

fn config() -> WhiteLightConfig {
    let chiller = ChillerConfig::new("127.0.0.1", 1)
        .with_command_timeout(Duration::from_millis(500))
        .with_telemetry_interval(Duration::from_secs(3600))
        .with_alarm_reset_holdoff(Duration::from_secs(2));
    let lamp = LampConfig::default()
        .with_warmup_period(Duration::from_secs(100))
        .with_cooldown_period(Duration::from_secs(50))
        .with_retries(3, Duration::from_secs(5))
        .with_max_lamp_on_delay(Duration::from_secs(10))
        .with_max_lamp_off_delay(Duration::from_secs(10))
        .with_shutter_timeout(Duration::from_secs(2));
    WhiteLightConfig::new("127.0.0.1", 1)
        .with_chiller(chiller)
        .with_lamp(lamp)
}

struct Rig {
    supervisor: Supervisor<MemoryIoChannel>,
    chiller: MockChiller,
    io: MemoryIoChannel,
}

impl Rig {
    /// Builds a configured supervisor and runs one cycle.
    async fn new(chiller: MockChiller) -> Self {
        let config = config();
        let io = MemoryIoChannel::new();
        let session = chiller.session(&config.chiller);
        let supervisor = Supervisor::new(config, session, io.clone()).unwrap();
        supervisor.configure_chiller().await.unwrap();
        supervisor.run_cycle().await;
        chiller.clear_log();
        io.clear_writes();
        Self {
            supervisor,
            chiller,
            io,
        }
    }

    fn basic_state(&self) -> LampBasicState {
        self.supervisor.lamp_state().basic_state
    }

    fn power_volts(&self) -> f64 {
        self.io.analog_output(AnalogOutput::LampPower)
    }

    fn set_lit(&self, lit: bool) {
        self.io
            .set_analog_input(AnalogInput::Photosensor, if lit { LIT_VOLTS } else { 0.0 });
    }

    /// Power is on exactly while the lamp is warming up or on.
    fn assert_power_follows_state(&self) {
        let powered = matches!(
            self.basic_state(),
            LampBasicState::Warmup | LampBasicState::On
        );
        assert_eq!(
            self.power_volts() > 0.0,
            powered,
            "state {} with {} V",
            self.basic_state(),
            self.power_volts()
        );
    }

    /// Turns the lamp on and lights it.
    async fn light(&self) {
        self.supervisor
            .turn_lamp_on(Some(watts(1000.0)))
            .await
            .unwrap();
        self.set_lit(true);
        self.supervisor.run_cycle().await;
        assert_eq!(self.basic_state(), LampBasicState::Warmup);
    }
}

fn watts(watts: f64) -> LampPower {
    LampPower::new(watts).unwrap()
}

async fn advance(secs: u64) {
    tokio::time::advance(Duration::from_secs(secs)).await;
}

fn drain(rx: &mut broadcast::Receiver<WhiteLightEvent>) -> Vec<WhiteLightEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ============================================================================
// Lamp lifecycle
// ============================================================================

mod lifecycle {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn turn_on_refused_without_cooling() {
        let rig = Rig::new(MockChiller::new()).await;

        let err = rig.supervisor.turn_lamp_on(None).await.unwrap_err();
        assert!(matches!(err, Error::SafetyViolation(_)), "{err:?}");
        assert!(rig.io.writes().is_empty());
        assert_eq!(rig.basic_state(), LampBasicState::Off);
        rig.assert_power_follows_state();
    }

    #[tokio::test(start_paused = true)]
    async fn turn_on_refused_when_watchdog_unreadable() {
        let rig = Rig::new(MockChiller::running()).await;
        rig.chiller.set_behavior(1, Behavior::Quirk);

        let err = rig.supervisor.turn_lamp_on(None).await.unwrap_err();
        assert!(
            matches!(err, Error::Protocol(ProtocolError::QuirkReply { .. })),
            "{err:?}"
        );
        assert!(rig.io.writes().is_empty());
        assert_eq!(rig.basic_state(), LampBasicState::Off);
    }

    #[tokio::test(start_paused = true)]
    async fn turn_on_refused_while_chiller_alarms() {
        let rig = Rig::new(MockChiller::running()).await;
        rig.chiller.set_level21(0x1);

        let err = rig.supervisor.turn_lamp_on(None).await.unwrap_err();
        assert!(matches!(err, Error::SafetyViolation(_)));
        assert!(rig.io.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn warmup_on_off_cooldown() {
        let rig = Rig::new(MockChiller::running()).await;

        rig.supervisor.turn_lamp_on(None).await.unwrap();
        assert_eq!(rig.basic_state(), LampBasicState::Warmup);
        assert_eq!(rig.supervisor.lamp_state().power, LampPower::MAX);
        assert!(rig.supervisor.lamp_state().warmup_end.is_some());
        rig.assert_power_follows_state();

        rig.set_lit(true);
        rig.supervisor.run_cycle().await;
        assert_eq!(rig.basic_state(), LampBasicState::Warmup);

        advance(100).await;
        let report = rig.supervisor.run_cycle().await;
        assert_eq!(report.lamp_state, Some(LampBasicState::On));
        assert!(report.corrective.is_empty());
        rig.assert_power_follows_state();

        rig.supervisor.turn_lamp_off(false).await.unwrap();
        rig.set_lit(false);
        assert_eq!(rig.basic_state(), LampBasicState::Cooldown);
        assert!(rig.supervisor.lamp_state().cooldown_end.is_some());
        rig.assert_power_follows_state();

        let err = rig.supervisor.turn_lamp_on(None).await.unwrap_err();
        assert!(matches!(err, Error::SafetyViolation(_)));

        advance(50).await;
        rig.supervisor.run_cycle().await;
        assert_eq!(rig.basic_state(), LampBasicState::Off);
        assert_eq!(rig.supervisor.lamp_state().cooldown_end, None);
    }

    #[tokio::test(start_paused = true)]
    async fn power_off_reports_on_hours() {
        let rig = Rig::new(MockChiller::running()).await;
        let mut events = rig.supervisor.subscribe();
        rig.light().await;

        advance(100).await;
        rig.supervisor.run_cycle().await;
        rig.supervisor.turn_lamp_off(false).await.unwrap();

        let on_hours: Vec<_> = drain(&mut events)
            .into_iter()
            .filter_map(|event| match event {
                WhiteLightEvent::LampOnHours { hours, total_hours } => Some((hours, total_hours)),
                _ => None,
            })
            .collect();
        assert_eq!(on_hours.len(), 1);
        let (hours, total_hours) = on_hours[0];
        assert!((hours * 3600.0 - 100.0).abs() < 1.0, "{hours} h");
        assert_eq!(hours, total_hours);
    }

    #[tokio::test(start_paused = true)]
    async fn power_change_while_on() {
        let rig = Rig::new(MockChiller::running()).await;
        rig.light().await;

        let before = rig.power_volts();
        rig.supervisor.turn_lamp_on(Some(watts(850.0))).await.unwrap();
        assert_eq!(rig.basic_state(), LampBasicState::Warmup);
        assert!(rig.power_volts() < before);
        assert_eq!(rig.supervisor.lamp_state().power, watts(850.0));
    }

    #[tokio::test(start_paused = true)]
    async fn unforced_off_refused_during_warmup() {
        let rig = Rig::new(MockChiller::running()).await;
        rig.light().await;

        let err = rig.supervisor.turn_lamp_off(false).await.unwrap_err();
        assert!(matches!(err, Error::SafetyViolation(_)));
        assert_eq!(rig.basic_state(), LampBasicState::Warmup);
        rig.assert_power_follows_state();

        rig.supervisor.turn_lamp_off(true).await.unwrap();
        assert_eq!(rig.basic_state(), LampBasicState::Cooldown);
        assert_eq!(rig.power_volts(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_power_is_a_value_error() {
        let rig = Rig::new(MockChiller::running()).await;
        let err = rig
            .supervisor
            .turn_lamp_on(Some(LampPower::OFF))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Value(ValueError::PowerOutOfRange { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn light_lost_faults_the_lamp() {
        let rig = Rig::new(MockChiller::running()).await;
        rig.light().await;

        rig.set_lit(false);
        let report = rig.supervisor.run_cycle().await;
        assert_eq!(report.lamp_state, Some(LampBasicState::Fault));
        assert_eq!(rig.supervisor.lamp_state().fault, Some(FaultReason::LightLost));
        rig.assert_power_follows_state();
        assert_eq!(
            report.corrective,
            vec![
                CorrectiveAction::LampOff,
                CorrectiveAction::ChillerStandby(StandbyCause::LampFault),
            ]
        );
        assert!(!rig.chiller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn power_mismatch_faults_the_lamp() {
        let rig = Rig::new(MockChiller::running()).await;
        rig.io.force_analog_output(AnalogOutput::LampPower, 4.0);

        rig.supervisor.run_cycle().await;
        assert_eq!(
            rig.supervisor.lamp_state().fault,
            Some(FaultReason::PowerMismatch {
                commanded_on: false,
                energized: true
            })
        );
        assert_eq!(rig.power_volts(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn lamp_io_failure_faults_the_lamp() {
        let rig = Rig::new(MockChiller::running()).await;
        let mut events = rig.supervisor.subscribe();
        rig.light().await;

        rig.io.set_connected(false);
        rig.supervisor.run_cycle().await;
        assert_eq!(rig.basic_state(), LampBasicState::Fault);
        assert!(matches!(
            rig.supervisor.lamp_state().fault,
            Some(FaultReason::IoChannel(_))
        ));
        assert!(drain(&mut events).iter().any(|event| matches!(
            event,
            WhiteLightEvent::ConnectionChanged {
                link: Link::LampIo,
                connected: false,
                ..
            }
        )));

        // The power-off write failed with the module; it is repeated on recovery
        rig.io.set_connected(true);
        let report = rig.supervisor.run_cycle().await;
        assert!(drain(&mut events).contains(&WhiteLightEvent::connected(Link::LampIo)));
        assert_eq!(report.corrective, vec![CorrectiveAction::LampOff]);
        rig.assert_power_follows_state();
    }
}

// ============================================================================
// Ignition retries
// ============================================================================

mod ignition {
    use super::*;

    /// Lets one ignition attempt time out, then waits out the retry sleep.
    async fn fail_attempt(rig: &Rig) {
        advance(10).await;
        let report = rig.supervisor.run_cycle().await;
        assert_eq!(report.lamp_state, Some(LampBasicState::CooldownPendingRetry));
        assert_eq!(report.corrective, vec![CorrectiveAction::LampOff]);
        rig.assert_power_follows_state();

        advance(5).await;
        let report = rig.supervisor.run_cycle().await;
        assert_eq!(report.lamp_state, Some(LampBasicState::Warmup));
        rig.assert_power_follows_state();
    }

    #[tokio::test(start_paused = true)]
    async fn three_failures_then_success() {
        let rig = Rig::new(MockChiller::running()).await;
        rig.supervisor.turn_lamp_on(None).await.unwrap();

        for _ in 0..3 {
            fail_attempt(&rig).await;
        }

        rig.set_lit(true);
        rig.supervisor.run_cycle().await;
        advance(100).await;
        rig.supervisor.run_cycle().await;
        assert_eq!(rig.basic_state(), LampBasicState::On);
        rig.assert_power_follows_state();
    }

    #[tokio::test(start_paused = true)]
    async fn fourth_failure_faults() {
        let rig = Rig::new(MockChiller::running()).await;
        let mut events = rig.supervisor.subscribe();
        rig.supervisor.turn_lamp_on(None).await.unwrap();

        for _ in 0..3 {
            fail_attempt(&rig).await;
        }
        advance(10).await;
        let report = rig.supervisor.run_cycle().await;

        assert_eq!(report.lamp_state, Some(LampBasicState::Fault));
        assert_eq!(
            rig.supervisor.lamp_state().fault,
            Some(FaultReason::IgnitionFailure { attempts: 4 })
        );
        assert!(report.standby_sent());
        assert!(!rig.chiller.is_running());
        rig.assert_power_follows_state();
        assert!(drain(&mut events).contains(&WhiteLightEvent::LampFault {
            reason: FaultReason::IgnitionFailure { attempts: 4 }
        }));

        let err = rig.supervisor.turn_lamp_on(None).await.unwrap_err();
        assert!(matches!(err, Error::SafetyViolation(_)));

        rig.supervisor.clear_fault().await.unwrap();
        assert_eq!(rig.basic_state(), LampBasicState::Cooldown);
    }

    #[tokio::test(start_paused = true)]
    async fn off_request_while_waiting_to_retry() {
        let rig = Rig::new(MockChiller::running()).await;
        rig.supervisor.turn_lamp_on(None).await.unwrap();

        advance(10).await;
        rig.supervisor.run_cycle().await;
        assert_eq!(rig.basic_state(), LampBasicState::CooldownPendingRetry);

        rig.supervisor.turn_lamp_off(false).await.unwrap();
        assert_eq!(rig.basic_state(), LampBasicState::Cooldown);
        advance(5).await;
        rig.supervisor.run_cycle().await;
        assert_eq!(rig.basic_state(), LampBasicState::Cooldown);
        rig.assert_power_follows_state();
    }
}

// ============================================================================
// Chiller alarms and control
// ============================================================================

mod chiller {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn alarm_commands_standby_before_lamp_off() {
        let rig = Rig::new(MockChiller::running()).await;
        let mut events = rig.supervisor.subscribe();
        rig.light().await;
        rig.chiller.clear_log();
        drain(&mut events);

        rig.chiller.raise_level1(0x4);
        let report = rig.supervisor.run_cycle().await;

        assert_eq!(
            report.corrective,
            vec![
                CorrectiveAction::ChillerStandby(StandbyCause::Alarm),
                CorrectiveAction::LampOff,
            ]
        );
        assert_eq!(rig.chiller.log()[..2], ["01WatchDog", "15sStatus_0"]);
        assert_eq!(rig.supervisor.lamp_state().fault, Some(FaultReason::ChillerAlarm));
        rig.assert_power_follows_state();
        // Level-1 read waits for the holdoff
        assert_eq!(report.level1_read, None);

        let correctives: Vec<_> = drain(&mut events)
            .into_iter()
            .filter_map(|event| match event {
                WhiteLightEvent::Corrective(action) => Some(action),
                _ => None,
            })
            .collect();
        assert_eq!(correctives, report.corrective);
    }

    #[tokio::test(start_paused = true)]
    async fn level_one_read_after_holdoff_resets_alarm() {
        let rig = Rig::new(MockChiller::running()).await;
        let mut events = rig.supervisor.subscribe();
        rig.chiller.raise_level1(0x4);

        rig.supervisor.run_cycle().await;
        assert_eq!(rig.basic_state(), LampBasicState::Fault);
        let err = rig.supervisor.clear_fault().await.unwrap_err();
        assert!(matches!(err, Error::SafetyViolation(_)));

        advance(2).await;
        let report = rig.supervisor.run_cycle().await;
        assert_eq!(report.level1_read, Some(AlarmBits::new(0x4)));
        // Standby again only while the chiller still runs
        assert!(!report.standby_sent());
        assert!(drain(&mut events).contains(&WhiteLightEvent::ChillerAlarmsRead {
            level1: AlarmBits::new(0x4),
            new: AlarmBits::new(0x4),
        }));

        let report = rig.supervisor.run_cycle().await;
        assert!(!report.watchdog.unwrap().alarms_present);
        rig.supervisor.clear_fault().await.unwrap();
        assert_eq!(rig.basic_state(), LampBasicState::Off);
        assert!(!rig.supervisor.state().chiller().alarms.has_alarms());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_chiller_refused_while_lamp_powered_or_cooling() {
        let rig = Rig::new(MockChiller::running()).await;
        rig.light().await;

        let err = rig.supervisor.stop_chiller().await.unwrap_err();
        assert!(matches!(err, Error::SafetyViolation(_)));
        assert!(rig.chiller.is_running());

        rig.supervisor.turn_lamp_off(true).await.unwrap();
        rig.set_lit(false);
        let err = rig.supervisor.stop_chiller().await.unwrap_err();
        assert!(matches!(err, Error::SafetyViolation(_)));
        assert!(rig.chiller.commands().is_empty());

        advance(50).await;
        rig.supervisor.run_cycle().await;
        let status = rig.supervisor.stop_chiller().await.unwrap();
        assert_eq!(status.controller_state, ChillerControllerState::Standby);
        assert!(!rig.chiller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn start_chiller_then_turn_on() {
        let rig = Rig::new(MockChiller::new()).await;

        let status = rig.supervisor.start_chiller().await.unwrap();
        assert!(status.is_cooling());
        rig.supervisor.turn_lamp_on(None).await.unwrap();
        assert_eq!(rig.basic_state(), LampBasicState::Warmup);
    }

    #[tokio::test(start_paused = true)]
    async fn quirk_reply_is_reported_as_typed_error() {
        let rig = Rig::new(MockChiller::running()).await;
        rig.chiller.set_behavior(17, Behavior::Quirk);

        let err = rig
            .supervisor
            .set_chiller_temperature(21.0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::QuirkReply { .. })
        ));
        assert_eq!(rig.basic_state(), LampBasicState::Off);
        assert!(rig.supervisor.state().chiller().connected);
    }

    #[tokio::test(start_paused = true)]
    async fn unreadable_watchdog_faults_powered_lamp() {
        let rig = Rig::new(MockChiller::running()).await;
        rig.light().await;

        // The chiller stops and alarms, but its watchdog replies are unusable
        rig.chiller.set_behavior(1, Behavior::Quirk);
        rig.chiller.set_running(false);
        rig.chiller.raise_level1(0x4);
        let report = rig.supervisor.run_cycle().await;

        assert_eq!(report.watchdog, None);
        assert_eq!(rig.basic_state(), LampBasicState::Fault);
        assert!(matches!(
            rig.supervisor.lamp_state().fault,
            Some(FaultReason::ChillerLink(_))
        ));
        assert!(report.corrective.contains(&CorrectiveAction::LampOff));
        rig.assert_power_follows_state();
        // Protocol errors leave the session usable
        assert!(report.chiller_connected);

        assert!(rig.supervisor.turn_lamp_on(None).await.is_err());
        assert_eq!(rig.basic_state(), LampBasicState::Fault);
    }

    #[tokio::test(start_paused = true)]
    async fn unreadable_watchdog_leaves_dark_lamp_alone() {
        let rig = Rig::new(MockChiller::running()).await;
        rig.chiller.set_behavior(1, Behavior::Quirk);

        for _ in 0..3 {
            let report = rig.supervisor.run_cycle().await;
            assert_eq!(report.watchdog, None);
            advance(1).await;
        }
        assert_eq!(rig.basic_state(), LampBasicState::Off);
        assert!(rig.io.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn set_temperature_checks_band() {
        let rig = Rig::new(MockChiller::running()).await;

        let err = rig
            .supervisor
            .set_chiller_temperature(40.0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Value(ValueError::TemperatureOutOfRange { .. })
        ));
        assert!(rig.chiller.commands().is_empty());

        rig.supervisor.set_chiller_temperature(21.5).await.unwrap();
        assert_eq!(rig.chiller.commands(), vec!["17sCtrlTmp+0215"]);
        assert_eq!(rig.supervisor.state().chiller().set_temperature, Some(21.5));
    }

    #[tokio::test(start_paused = true)]
    async fn first_cycle_configures_and_reads_telemetry() {
        let chiller = MockChiller::running();
        let config = config();
        let session = chiller.session(&config.chiller);
        let supervisor = Supervisor::new(config, session, MemoryIoChannel::new()).unwrap();

        let report = supervisor.run_cycle().await;
        assert!(report.chiller_connected);
        assert!(report.telemetry_read);
        let log = chiller.log();
        assert_eq!(log[0], "17sCtrlTmp+0200");
        assert_eq!(log[11], "01WatchDog");

        let state = supervisor.state();
        assert_eq!(state.chiller().set_temperature, Some(20.0));
        assert_eq!(state.chiller().telemetry.unwrap().uptime_minutes, 123);

        let report = supervisor.run_cycle().await;
        assert!(!report.telemetry_read);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_chiller_faults_powered_lamp() {
        let rig = Rig::new(MockChiller::running()).await;
        let mut events = rig.supervisor.subscribe();
        rig.light().await;

        rig.chiller.go_silent();
        let report = rig.supervisor.run_cycle().await;

        assert!(!report.chiller_connected);
        assert!(matches!(
            rig.supervisor.lamp_state().fault,
            Some(FaultReason::ChillerLink(_))
        ));
        rig.assert_power_follows_state();
        assert!(!rig.supervisor.state().chiller().connected);
        assert!(drain(&mut events).iter().any(|event| matches!(
            event,
            WhiteLightEvent::ConnectionChanged {
                link: Link::Chiller,
                connected: false,
                ..
            }
        )));

        let err = rig.supervisor.start_chiller().await.unwrap_err();
        assert!(err.is_transport());
    }
}

// ============================================================================
// Shutter
// ============================================================================

mod shutter {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn open_polls_until_limit_switch() {
        let rig = Rig::new(MockChiller::running()).await;
        rig.io.set_digital_input(DigitalInput::ShutterClosed, true);

        let io = rig.io.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(400)).await;
            io.set_digital_input(DigitalInput::ShutterClosed, false);
            io.set_digital_input(DigitalInput::ShutterOpen, true);
        });

        let state = rig.supervisor.open_shutter().await.unwrap();
        assert_eq!(state, ShutterState::Open);
        assert_eq!(
            rig.io.writes(),
            vec![
                IoWrite::Digital(DigitalOutput::ShutterDirection, false),
                IoWrite::Digital(DigitalOutput::ShutterEnable, false),
                IoWrite::Digital(DigitalOutput::ShutterEnable, true),
            ]
        );
        assert_eq!(rig.supervisor.lamp_state().shutter, ShutterState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_disables_motor() {
        let rig = Rig::new(MockChiller::running()).await;
        rig.io.set_digital_input(DigitalInput::ShutterOpen, true);

        let err = rig.supervisor.close_shutter().await.unwrap_err();
        assert!(matches!(
            err,
            Error::IoChannel(IoChannelError::ShutterTimeout {
                target: "closed",
                timeout_ms: 2000
            })
        ));
        assert!(rig.io.digital_output(DigitalOutput::ShutterEnable));
    }

    #[tokio::test(start_paused = true)]
    async fn already_in_place_does_nothing() {
        let rig = Rig::new(MockChiller::running()).await;
        rig.io.set_digital_input(DigitalInput::ShutterOpen, true);

        assert_eq!(rig.supervisor.open_shutter().await.unwrap(), ShutterState::Open);
        assert!(rig.io.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn both_switches_active_is_refused() {
        let rig = Rig::new(MockChiller::running()).await;
        rig.io.set_digital_input(DigitalInput::ShutterOpen, true);
        rig.io.set_digital_input(DigitalInput::ShutterClosed, true);

        let err = rig.supervisor.close_shutter().await.unwrap_err();
        assert!(matches!(err, Error::SafetyViolation(_)));
        assert!(rig.io.writes().is_empty());
    }
}

// ============================================================================
// Poll loop
// ============================================================================

mod run_loop {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn runs_until_shutdown() {
        let rig = Rig::new(MockChiller::running()).await;
        let (stop_tx, stop_rx) = watch::channel(false);
        let runner = rig.supervisor.clone();
        let task = tokio::spawn(async move { runner.run(stop_rx).await });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        stop_tx.send(true).unwrap();
        task.await.unwrap();

        let polls = rig
            .chiller
            .log()
            .iter()
            .filter(|body| body.as_str() == "01WatchDog")
            .count();
        assert!(polls >= 2, "{polls} watchdog polls");

        let after = rig.chiller.log().len();
        advance(5).await;
        assert_eq!(rig.chiller.log().len(), after);
    }

    /// Blinks the error line `count` times, then pauses.
    async fn blink(io: &MemoryIoChannel, count: u32) {
        for _ in 0..count {
            io.set_digital_input(DigitalInput::BlinkingError, true);
            tokio::time::sleep(Duration::from_millis(500)).await;
            io.set_digital_input(DigitalInput::BlinkingError, false);
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        tokio::time::sleep(Duration::from_millis(1500)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn loop_decodes_blink_codes() {
        let rig = Rig::new(MockChiller::running()).await;
        let (stop_tx, stop_rx) = watch::channel(false);
        let runner = rig.supervisor.clone();
        let task = tokio::spawn(async move { runner.run(stop_rx).await });

        rig.io.set_digital_input(DigitalInput::ErrorExists, true);
        tokio::time::sleep(Duration::from_secs(2)).await;
        for _ in 0..2 {
            blink(&rig.io, 3).await;
        }
        stop_tx.send(true).unwrap();
        task.await.unwrap();

        let lamp = rig.supervisor.lamp_state();
        assert_eq!(lamp.controller_error, LampControllerError::AccessDoor);
        assert_eq!(rig.basic_state(), LampBasicState::Fault);
    }

    #[tokio::test(start_paused = true)]
    async fn published_state_serializes() {
        let rig = Rig::new(MockChiller::running()).await;
        let json = serde_json::to_value(rig.supervisor.state()).unwrap();
        assert_eq!(json["lamp"]["basic_state"], "OFF");
        assert_eq!(json["chiller"]["connected"], true);
    }
}
