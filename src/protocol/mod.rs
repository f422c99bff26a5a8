// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Chiller wire protocol.
//!
//! The chiller speaks an ASCII request/reply protocol over a serial line,
//! reached here through a TCP-to-serial bridge.
//!
//! - [`encode`]/[`decode`]: frame codec with checksums.
//! - [`ChillerSession`]: one outstanding command at a time, with a
//!   per-command timeout.

mod codec;
mod session;

pub use codec::{
    COMMAND_START, DEFAULT_DEVICE_ID, REPLY_START, TERMINATOR, checksum, decode, encode,
    encode_reply,
};
pub use session::{ByteStream, ChillerSession, SessionState};
