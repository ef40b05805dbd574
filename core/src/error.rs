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

//! Error taxonomy shared by every stage of the validation pipeline.
//!
//! Errors never cross a module boundary as panics or raw strings: each leaf
//! module defines its own enum, and the layer above converts it via `From`
//! into whatever it needs. `ValidationError` is the one exposed at the top
//! of the pipeline; its `Display` impl is the `reason` string that ends up
//! in a [`crate::result::ValidationResult`].

use std::fmt;

use crate::proxy::ProxyError;

/// Error raised while talking to a single SMTP server.
#[derive(Debug)]
pub enum SmtpError {
	/// Could not establish the TCP/SOCKS5 connection, or a read/write on an
	/// established connection failed or timed out.
	Transport(String),
	/// The server spoke SMTP but not in a way we could make progress with
	/// (bad greeting, EHLO and HELO both rejected, STARTTLS advertised but
	/// refused).
	Protocol(String),
	/// No proxy was available to dial through.
	ProxyExhausted,
}

impl fmt::Display for SmtpError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SmtpError::Transport(msg) => write!(f, "transport error: {}", msg),
			SmtpError::Protocol(msg) => write!(f, "protocol error: {}", msg),
			SmtpError::ProxyExhausted => write!(f, "no proxy available"),
		}
	}
}

impl std::error::Error for SmtpError {}

impl From<ProxyError> for SmtpError {
	fn from(_: ProxyError) -> Self {
		SmtpError::ProxyExhausted
	}
}

/// Error raised by the DNS resolver facade. The facade itself never returns
/// these to its callers (failures collapse to `false`/empty/`None` per
/// §4.C), but it is useful internally to distinguish "no records" from
/// "the resolver itself errored".
#[derive(Debug, thiserror::Error)]
pub enum DnsError {
	#[error("resolver error: {0}")]
	Resolve(String),
}

/// Terminal or retryable error produced by the top-level email validator.
///
/// Variant names mirror the table in §7 of the specification.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
	#[error("Invalid email format")]
	MalformedInput,

	#[error("Domain does not exist")]
	NoSuchDomain,

	#[error("No mail servers found for domain")]
	NoMailServers,

	#[error("No proxy available to verify mailbox")]
	ProxyExhausted,

	#[error("Failed to verify mailbox: {0}")]
	Transport(#[source] TransportDisplay),

	#[error("Failed to verify mailbox: {0}")]
	Protocol(#[source] TransportDisplay),

	#[error("Failed to verify mailbox")]
	MailboxRejected,

	#[error("Catch-all domain detected")]
	CatchAllRejected,
}

/// Wraps a `String` so it can sit behind `#[source]` without pulling in a
/// dependency on whatever transport-level error type produced the message.
#[derive(Debug)]
pub struct TransportDisplay(pub String);

impl fmt::Display for TransportDisplay {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::error::Error for TransportDisplay {}

impl From<SmtpError> for ValidationError {
	fn from(err: SmtpError) -> Self {
		match err {
			SmtpError::Transport(msg) => ValidationError::Transport(TransportDisplay(msg)),
			SmtpError::Protocol(msg) => ValidationError::Protocol(TransportDisplay(msg)),
			SmtpError::ProxyExhausted => ValidationError::ProxyExhausted,
		}
	}
}
