// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Simulated ThermoTek chiller speaking the wire protocol over an
//! in-memory stream.

#![allow(dead_code)]

use std::sync::Arc;

use atwhitelight::protocol::{ChillerSession, encode_reply};
use atwhitelight::types::AlarmBits;
use atwhitelight::ChillerConfig;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, duplex};

/// How the simulator answers one command ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Answer normally.
    Normal,
    /// Answer with the `#23` quirk reply.
    Quirk,
    /// Never answer.
    Silent,
    /// Answer with a device error code.
    DeviceError(char),
}

#[derive(Debug)]
struct Sim {
    running: bool,
    level1: AlarmBits,
    level21: AlarmBits,
    level22: AlarmBits,
    warnings: AlarmBits,
    overrides: Vec<(u8, Behavior)>,
    silent_all: bool,
    log: Vec<String>,
}

/// Handle to a simulated chiller. Clones share the same device.
#[derive(Debug, Clone)]
pub struct MockChiller {
    sim: Arc<Mutex<Sim>>,
}

impl MockChiller {
    /// Creates a chiller in standby with no alarms.
    pub fn new() -> Self {
        Self {
            sim: Arc::new(Mutex::new(Sim {
                running: false,
                level1: AlarmBits::NONE,
                level21: AlarmBits::NONE,
                level22: AlarmBits::NONE,
                warnings: AlarmBits::NONE,
                overrides: Vec::new(),
                silent_all: false,
                log: Vec::new(),
            })),
        }
    }

    /// Creates a chiller already running with its pump on.
    pub fn running() -> Self {
        let chiller = Self::new();
        chiller.sim.lock().running = true;
        chiller
    }

    /// Starts serving and returns a session connected to it.
    pub fn session(&self, config: &ChillerConfig) -> ChillerSession {
        let (local, remote) = duplex(1024);
        tokio::spawn(serve(Arc::clone(&self.sim), remote));
        ChillerSession::from_stream(local, config)
    }

    pub fn set_running(&self, running: bool) {
        self.sim.lock().running = running;
    }

    pub fn is_running(&self) -> bool {
        self.sim.lock().running
    }

    /// Latches level-1 alarm bits. They clear when read.
    pub fn raise_level1(&self, bits: u32) {
        let mut sim = self.sim.lock();
        sim.level1 = sim.level1.union(AlarmBits::new(bits));
    }

    /// Sets the level-2 sublevel-1 register.
    pub fn set_level21(&self, bits: u32) {
        self.sim.lock().level21 = AlarmBits::new(bits);
    }

    pub fn set_warnings(&self, bits: u32) {
        self.sim.lock().warnings = AlarmBits::new(bits);
    }

    /// Changes how one command ID is answered.
    pub fn set_behavior(&self, command_id: u8, behavior: Behavior) {
        let mut sim = self.sim.lock();
        sim.overrides.retain(|(id, _)| *id != command_id);
        sim.overrides.push((command_id, behavior));
    }

    /// Stops answering anything.
    pub fn go_silent(&self) {
        self.sim.lock().silent_all = true;
    }

    /// Command bodies received so far, e.g. `15sStatus_0`.
    pub fn log(&self) -> Vec<String> {
        self.sim.lock().log.clone()
    }

    pub fn clear_log(&self) {
        self.sim.lock().log.clear();
    }

    /// Command bodies received so far, minus watchdog polls.
    pub fn commands(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter(|body| !body.starts_with("01"))
            .collect()
    }
}

async fn serve(sim: Arc<Mutex<Sim>>, stream: DuplexStream) {
    let mut stream = BufReader::new(stream);
    let mut frame = Vec::new();
    loop {
        frame.clear();
        match stream.read_until(b'\r', &mut frame).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let Some(reply) = answer(&sim, &frame) else {
            continue;
        };
        if stream.get_mut().write_all(&reply).await.is_err() {
            return;
        }
    }
}

fn answer(sim: &Mutex<Sim>, frame: &[u8]) -> Option<Vec<u8>> {
    let text = String::from_utf8_lossy(frame);
    let text = text.trim_end_matches('\r');
    // start + device ID, body, checksum
    let body = text.get(3..text.len().saturating_sub(2))?.to_string();
    let command_id: u8 = body.get(0..2)?.parse().ok()?;
    let name = body.get(2..10)?.to_string();
    let data = body.get(10..).unwrap_or_default().to_string();

    let mut sim = sim.lock();
    sim.log.push(body);
    if sim.silent_all {
        return None;
    }
    let behavior = sim
        .overrides
        .iter()
        .find(|(id, _)| *id == command_id)
        .map_or(Behavior::Normal, |(_, behavior)| *behavior);
    match behavior {
        Behavior::Normal => {}
        Behavior::Quirk => return Some(b"#23\r".to_vec()),
        Behavior::Silent => return None,
        Behavior::DeviceError(code) => {
            return Some(encode_reply("01", command_id, code, &name, ""));
        }
    }

    let data = match command_id {
        1 => {
            let alarms =
                !(sim.level1.is_empty() && sim.level21.is_empty() && sim.level22.is_empty());
            format!(
                "{}{}{}{}",
                if sim.running { '2' } else { '1' },
                u8::from(sim.running),
                u8::from(alarms),
                u8::from(!sim.warnings.is_empty()),
            )
        }
        3 | 4 => "+0200".to_string(),
        7 => "+0215".to_string(),
        8 => "+0225".to_string(),
        9 => "0025".to_string(),
        10 | 11 => "+1250".to_string(),
        13 => "040,C".to_string(),
        15 => {
            sim.running = data == "1";
            data
        }
        18 => {
            let bits = sim.level1;
            sim.level1 = AlarmBits::NONE;
            bits.encode_reversed_hex(6)
        }
        19 => {
            let bits = if data == "1" { sim.level21 } else { sim.level22 };
            format!("{data}{}", bits.encode_reversed_hex(8))
        }
        20 => sim.warnings.encode_reversed_hex(8),
        49 => "000123".to_string(),
        50..=53 => "0030".to_string(),
        _ => data,
    };
    Some(encode_reply("01", command_id, '0', &name, &data))
}
