// check-if-email-exists
// Copyright (C) 2018-2022 Reacher

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! The boxed transport stream a [`super::Dialog`] talks over: either a
//! direct TCP connection or one tunnelled through a SOCKS5 proxy, optionally
//! upgraded to TLS in place by STARTTLS.
//!
//! Kept as a single trait object rather than the teacher's
//! `NetworkStream` enum (`async-smtp`'s `client::net::NetworkStream`)
//! because we no longer depend on `async-smtp` itself (§4.D rewrote the
//! dialog as a hand-rolled line-level state machine — see DESIGN.md).

use async_std::io::{Read, Write};

/// Any stream usable by the dialog: readable, writable, and safe to move
/// across an `.await` boundary.
pub trait AsyncStream: Read + Write + Unpin + Send {}

impl<T: Read + Write + Unpin + Send> AsyncStream for T {}

pub type BoxedStream = Box<dyn AsyncStream>;
