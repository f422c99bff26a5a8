// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the typed chiller client against a simulated
//! chiller.

mod common;

use std::time::Duration;

use atwhitelight::chiller::ChillerClient;
use atwhitelight::protocol::SessionState;
use atwhitelight::types::{AlarmBits, AlarmSublevel, ChillerControllerState, ChillerRunState};
use atwhitelight::{ChillerConfig, DeviceError, Error, ProtocolError, TransportError};
use common::{Behavior, MockChiller};

fn config() -> ChillerConfig {
    ChillerConfig::new("127.0.0.1", 1).with_command_timeout(Duration::from_millis(500))
}

fn client(chiller: &MockChiller) -> ChillerClient {
    ChillerClient::new(chiller.session(&config()))
}

// ============================================================================
// Status and control
// ============================================================================

mod status {
    use super::*;

    #[tokio::test]
    async fn start_and_stop() {
        let chiller = MockChiller::new();
        let mut client = client(&chiller);

        let status = client.watchdog().await.unwrap();
        assert_eq!(status.controller_state, ChillerControllerState::Standby);
        assert!(!status.is_cooling());

        client.set_status(ChillerRunState::Run).await.unwrap();
        let status = client.watchdog().await.unwrap();
        assert!(status.is_cooling());

        client.set_status(ChillerRunState::Standby).await.unwrap();
        assert!(!chiller.is_running());
        assert_eq!(
            chiller.log(),
            vec!["01WatchDog", "15sStatus_1", "01WatchDog", "15sStatus_0"]
        );
    }

    #[tokio::test]
    async fn configure_sends_temperature_then_alarms_then_warnings() {
        let chiller = MockChiller::new();
        let mut client = client(&chiller);

        client.configure(&config()).await.unwrap();

        assert_eq!(
            chiller.log(),
            vec![
                "17sCtrlTmp+0200",
                "26sHiSpTAl+0300",
                "27sLoSpTAl+0100",
                "28sHiAmTAl+0400",
                "29sLoAmTAl+0050",
                "30sLoPFlAl+0005",
                "21sHiSpTWn+0250",
                "22sLoSpTWn+0150",
                "28sHiAmTWn+0350",
                "29sLoAmTWn+0100",
                "30sLoPFlWn+0008",
            ]
        );
        assert_eq!(client.set_temperature(), Some(20.0));
    }

    #[tokio::test]
    async fn rejected_temperature_is_a_device_error() {
        let chiller = MockChiller::new();
        chiller.set_behavior(17, Behavior::DeviceError('3'));
        let mut client = client(&chiller);

        let err = client.set_control_temperature(22.0).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Device(DeviceError::ParameterOutOfRange)
        ));
        assert_eq!(client.set_temperature(), None);
        assert!(client.is_connected());
    }
}

// ============================================================================
// Alarms
// ============================================================================

mod alarms {
    use super::*;

    #[tokio::test]
    async fn level_one_read_clears_the_latch() {
        let chiller = MockChiller::running();
        chiller.raise_level1(0x12);
        let mut client = client(&chiller);

        assert!(client.watchdog().await.unwrap().alarms_present);
        assert_eq!(client.read_l1_alarms().await.unwrap(), AlarmBits::new(0x12));
        assert!(!client.watchdog().await.unwrap().alarms_present);
        assert_eq!(client.read_l1_alarms().await.unwrap(), AlarmBits::NONE);
    }

    #[tokio::test]
    async fn level_two_registers_are_not_consumed() {
        let chiller = MockChiller::running();
        chiller.set_level21(0x100);
        let mut client = client(&chiller);

        for _ in 0..2 {
            assert_eq!(
                client.read_l2_alarms(AlarmSublevel::One).await.unwrap(),
                AlarmBits::new(0x100)
            );
        }
        assert_eq!(
            client.read_l2_alarms(AlarmSublevel::Two).await.unwrap(),
            AlarmBits::NONE
        );
        assert!(client.watchdog().await.unwrap().alarms_present);
    }

    #[tokio::test]
    async fn warnings_are_reversed_hex() {
        let chiller = MockChiller::running();
        chiller.set_warnings(0xA3);
        let mut client = client(&chiller);

        let status = client.watchdog().await.unwrap();
        assert!(status.warnings_present);
        assert!(!status.alarms_present);
        assert_eq!(client.read_warnings().await.unwrap(), AlarmBits::new(0xA3));
    }
}

// ============================================================================
// Telemetry
// ============================================================================

mod telemetry {
    use super::*;

    #[tokio::test]
    async fn read_telemetry_collects_every_value() {
        let chiller = MockChiller::running();
        let mut client = client(&chiller);

        let telemetry = client.read_telemetry().await.unwrap();
        assert_eq!(telemetry.temperatures.supply.celsius, 20.0);
        assert!(!telemetry.temperatures.supply.unreliable);
        assert_eq!(telemetry.temperatures.return_coolant.celsius, 21.5);
        assert!(telemetry.temperatures.return_coolant.unreliable);
        assert_eq!(telemetry.coolant_flow, 2.5);
        assert_eq!(telemetry.fan_speeds, [30.0; 4]);
        assert_eq!(telemetry.tec_bank_currents, [1.25, 1.25]);
        assert!(telemetry.tec_drive.is_cooling);
        assert_eq!(telemetry.uptime_minutes, 123);
        assert_eq!(chiller.log().len(), 12);
    }
}

// ============================================================================
// Failures
// ============================================================================

mod failures {
    use super::*;

    #[tokio::test]
    async fn quirk_reply_is_a_typed_error() {
        let chiller = MockChiller::running();
        chiller.set_behavior(17, Behavior::Quirk);
        let mut client = client(&chiller);

        let err = client.set_control_temperature(21.0).await.unwrap_err();
        match err {
            Error::Protocol(ProtocolError::QuirkReply { raw }) => assert_eq!(raw, "#23"),
            other => panic!("expected quirk reply, got {other:?}"),
        }
        // The session stays usable
        assert!(client.watchdog().await.unwrap().is_cooling());
    }

    #[tokio::test(start_paused = true)]
    async fn silence_invalidates_the_session() {
        let chiller = MockChiller::running();
        chiller.go_silent();
        let mut client = client(&chiller);

        let err = client.watchdog().await.unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Timeout(500))));
        assert_eq!(client.session().state(), SessionState::Invalid);

        let err = client.read_uptime().await.unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Invalid(_))));
        assert_eq!(chiller.log().len(), 1);
    }
}
