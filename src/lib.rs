// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `atwhitelight` - Supervisor for a mercury white-light calibration source.
//!
//! The source is a high-power mercury lamp with a shutter, driven through
//! an analog/digital I/O module, and cooled by a ThermoTek chiller reached
//! over TCP. The lamp must never run without cooling and must not be
//! power-cycled faster than it can warm up and cool down, so all hardware
//! access goes through a single supervisor that enforces those rules.
//!
//! # Layers
//!
//! - [`protocol`]: chiller frame codec and the one-command-at-a-time
//!   session with timeouts.
//! - [`chiller`]: typed chiller operations, alarm bookkeeping and
//!   telemetry.
//! - [`io`] and [`lamp`]: the I/O module abstraction, the lamp and shutter
//!   driver, and the lamp lifecycle state machine.
//! - [`supervisor`]: the poll loop and the control handle.
//! - [`state`] and [`event`]: published state and the event bus.
//!
//! # Quick Start
//!
//! ```no_run
//! use atwhitelight::{MemoryIoChannel, Supervisor, WhiteLightConfig};
//! use atwhitelight::types::LampPower;
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> atwhitelight::Result<()> {
//!     let config = WhiteLightConfig::from_json_str(r#"{
//!         "chiller": { "host": "192.168.1.40", "port": 4001 },
//!         "lamp": { "warmup_period": 900, "cooldown_period": 900 }
//!     }"#)?;
//!
//!     let supervisor = Supervisor::connect(config, MemoryIoChannel::new()).await?;
//!     let mut events = supervisor.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{event:?}");
//!         }
//!     });
//!
//!     let (_stop, stop_rx) = watch::channel(false);
//!     let runner = supervisor.clone();
//!     tokio::spawn(async move { runner.run(stop_rx).await });
//!
//!     supervisor.start_chiller().await?;
//!     supervisor.turn_lamp_on(Some(LampPower::new(1000.0)?)).await?;
//!     supervisor.open_shutter().await?;
//!     Ok(())
//! }
//! ```

pub mod chiller;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod io;
pub mod lamp;
pub mod protocol;
pub mod response;
pub mod state;
pub mod supervisor;
pub mod types;

pub use chiller::{ChillerClient, ChillerTelemetry};
pub use command::ChillerCommand;
pub use config::{ChillerConfig, LampConfig, WhiteLightConfig};
pub use error::{
    ConfigError, DeviceError, Error, IoChannelError, ProtocolError, Result, TransportError,
    ValueError,
};
pub use event::{EventBus, WhiteLightEvent};
pub use io::{IoChannel, MemoryIoChannel};
pub use lamp::{LampBasicState, LampDriver, LampLifecycle};
pub use protocol::ChillerSession;
pub use response::{ChillerReply, WatchdogStatus};
pub use state::WhiteLightState;
pub use supervisor::{CycleReport, Supervisor};
pub use types::{AlarmBits, LampPower, ShutterState};
