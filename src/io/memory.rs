// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory I/O module for tests and simulation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::IoChannelError;
use crate::types::{dac_code_to_volts, volts_to_dac_code};

use super::{AnalogInput, AnalogOutput, DigitalInput, DigitalOutput, IoChannel};

/// A write recorded by [`MemoryIoChannel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IoWrite {
    /// An analog output was driven, in volts after quantization.
    Analog(AnalogOutput, f64),
    /// A digital output was driven.
    Digital(DigitalOutput, bool),
}

#[derive(Debug)]
struct Lines {
    connected: bool,
    analog_inputs: HashMap<AnalogInput, f64>,
    analog_outputs: HashMap<AnalogOutput, f64>,
    digital_inputs: HashMap<DigitalInput, bool>,
    digital_outputs: HashMap<DigitalOutput, bool>,
    writes: Vec<IoWrite>,
}

/// A simulated I/O module.
///
/// Clones share the same lines, so a test can keep one handle to drive
/// inputs while the driver owns another. Analog outputs are quantized to
/// the 12-bit DAC on write. Digital inputs start low and digital outputs
/// start high.
///
/// # Examples
///
/// ```
/// use atwhitelight::io::{AnalogInput, IoChannel, MemoryIoChannel};
///
/// let mut channel = MemoryIoChannel::new();
/// let handle = channel.clone();
///
/// handle.set_analog_input(AnalogInput::Photosensor, 2.5);
/// assert_eq!(channel.read_analog(AnalogInput::Photosensor).unwrap(), 2.5);
///
/// handle.set_connected(false);
/// assert!(channel.read_analog(AnalogInput::Photosensor).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct MemoryIoChannel {
    lines: Arc<Mutex<Lines>>,
}

impl MemoryIoChannel {
    /// Creates a connected module with every input low.
    #[must_use]
    pub fn new() -> Self {
        let lines = Lines {
            connected: true,
            analog_inputs: HashMap::new(),
            analog_outputs: HashMap::new(),
            digital_inputs: HashMap::new(),
            digital_outputs: HashMap::from([
                (DigitalOutput::ShutterDirection, true),
                (DigitalOutput::ShutterEnable, true),
            ]),
            writes: Vec::new(),
        };
        Self {
            lines: Arc::new(Mutex::new(lines)),
        }
    }

    /// Connects or disconnects the module.
    pub fn set_connected(&self, connected: bool) {
        self.lines.lock().connected = connected;
    }

    /// Sets an analog input voltage.
    pub fn set_analog_input(&self, line: AnalogInput, volts: f64) {
        self.lines.lock().analog_inputs.insert(line, volts);
    }

    /// Sets a digital input level.
    pub fn set_digital_input(&self, line: DigitalInput, high: bool) {
        self.lines.lock().digital_inputs.insert(line, high);
    }

    /// Overrides the voltage an analog output reads back, without
    /// recording a write. Simulates a stuck or externally driven output.
    pub fn force_analog_output(&self, line: AnalogOutput, volts: f64) {
        self.lines.lock().analog_outputs.insert(line, volts);
    }

    /// Returns the voltage an analog output is driving.
    #[must_use]
    pub fn analog_output(&self, line: AnalogOutput) -> f64 {
        self.lines
            .lock()
            .analog_outputs
            .get(&line)
            .copied()
            .unwrap_or(0.0)
    }

    /// Returns the level a digital output is driving.
    #[must_use]
    pub fn digital_output(&self, line: DigitalOutput) -> bool {
        self.lines
            .lock()
            .digital_outputs
            .get(&line)
            .copied()
            .unwrap_or(true)
    }

    /// Returns every write made so far.
    #[must_use]
    pub fn writes(&self) -> Vec<IoWrite> {
        self.lines.lock().writes.clone()
    }

    /// Forgets recorded writes.
    pub fn clear_writes(&self) {
        self.lines.lock().writes.clear();
    }

    fn with_connected<T>(&self, f: impl FnOnce(&mut Lines) -> T) -> Result<T, IoChannelError> {
        let mut lines = self.lines.lock();
        if !lines.connected {
            return Err(IoChannelError::NotConnected);
        }
        Ok(f(&mut lines))
    }
}

impl Default for MemoryIoChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl IoChannel for MemoryIoChannel {
    fn read_analog(&mut self, line: AnalogInput) -> Result<f64, IoChannelError> {
        self.with_connected(|lines| lines.analog_inputs.get(&line).copied().unwrap_or(0.0))
    }

    fn read_analog_output(&mut self, line: AnalogOutput) -> Result<f64, IoChannelError> {
        self.with_connected(|lines| lines.analog_outputs.get(&line).copied().unwrap_or(0.0))
    }

    fn write_analog(&mut self, line: AnalogOutput, volts: f64) -> Result<(), IoChannelError> {
        if !volts.is_finite() || volts < 0.0 {
            return Err(IoChannelError::Line {
                channel: line.hardware_name(),
                message: format!("cannot drive {volts} V"),
            });
        }
        let quantized = dac_code_to_volts(volts_to_dac_code(volts));
        self.with_connected(|lines| {
            lines.analog_outputs.insert(line, quantized);
            lines.writes.push(IoWrite::Analog(line, quantized));
        })
    }

    fn read_digital(&mut self, line: DigitalInput) -> Result<bool, IoChannelError> {
        self.with_connected(|lines| lines.digital_inputs.get(&line).copied().unwrap_or(false))
    }

    fn write_digital(&mut self, line: DigitalOutput, high: bool) -> Result<(), IoChannelError> {
        self.with_connected(|lines| {
            lines.digital_outputs.insert(line, high);
            lines.writes.push(IoWrite::Digital(line, high));
        })
    }
}
