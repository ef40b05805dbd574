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

//! SMTP Dialog (§4.D): the per-connection state machine — greeting,
//! EHLO/HELO, optional STARTTLS, MAIL FROM, RCPT TO, QUIT — driven over a
//! SOCKS5-proxied (or direct) TCP connection.
//!
//! This descends directly from `connect_to_host`/`email_deliverable` in the
//! teacher crate's `core/src/smtp/mod.rs`, generalised to take a
//! [`ProxyHandle`] from the pool and an effective [`ProviderProfile`]
//! instead of a single fixed proxy/security setting, and to classify RCPT
//! codes numerically (§4.D) instead of string-matching the transport
//! error's `Display` output.

pub mod response;
pub mod sender;
mod stream;

use async_native_tls::TlsConnector;
use async_std::io::{prelude::*, BufReader};
use async_std::net::TcpStream;
use fast_socks5::client::{Config as Socks5Config, Socks5Stream};
use std::time::Duration;
use trust_dns_proto::rr::Name;

use crate::error::SmtpError;
use crate::provider::ProviderProfile;
use crate::proxy::{Pool, ProxyHandle};
use response::{classify_rcpt, Fed, RcptOutcome, ResponseAccumulator, SmtpResponse};
use stream::BoxedStream;

/// States of one SMTP conversation (§3 `SMTPExchange`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
	Dialing,
	Greeted,
	Heloed,
	MailFromAccepted,
	RcptEvaluated,
	Closed,
}

/// Outcome of a single RCPT probe, the information [`super::verifier`] needs
/// to decide whether to retry, short-circuit, or accept.
#[derive(Debug, Clone)]
pub struct RcptResult {
	pub outcome: RcptOutcome,
	pub code: u16,
	pub message: String,
}

impl RcptResult {
	pub fn exists(&self) -> bool {
		matches!(self.outcome, RcptOutcome::Exists | RcptOutcome::LikelyExistsGreylisted)
	}
}

/// An open SMTP conversation to one MX host.
pub struct Dialog {
	stream: BufReader<BoxedStream>,
	state: DialogState,
	tls: bool,
	proxy: Option<ProxyHandle>,
	helo_host: String,
	timeout: Duration,
}

/// Connect to `(host, 25)`, through `pool` if it has any eligible proxy, and
/// run the greeting + EHLO/HELO steps (§4.D steps 1-3). `domain` is the
/// recipient address's own domain, used as the EHLO/HELO fallback identity
/// when `profile` doesn't specify a `helo_host`.
pub async fn dial(
	pool: &Pool,
	host: &Name,
	port: u16,
	profile: &ProviderProfile,
	domain: &str,
) -> Result<Dialog, SmtpError> {
	// Hostname verification fails if it ends with '.': through SOCKS5 this
	// can surface as an `io: incomplete` error (teacher comment, preserved).
	let host_str = host.to_string();
	let host_str = host_str.trim_end_matches('.').to_string();

	let proxy = if pool.is_empty() {
		None
	} else {
		Some(pool.acquire().map_err(|_| SmtpError::ProxyExhausted)?)
	};

	let connect_result = connect_stream(&proxy, &host_str, port).await;
	let raw_stream = match connect_result {
		Ok(stream) => stream,
		Err(err) => {
			if let Some(handle) = &proxy {
				pool.mark_failure(handle);
			}
			return Err(SmtpError::Transport(err));
		}
	};

	let helo_host = profile.helo_host.map(str::to_string).unwrap_or_else(|| domain.to_string());
	let mut dialog = Dialog {
		stream: BufReader::new(raw_stream),
		state: DialogState::Dialing,
		tls: false,
		proxy,
		helo_host,
		timeout: profile.timeout(),
	};

	if let Err(err) = dialog.greet().await {
		dialog.fail(pool);
		return Err(err);
	}
	if let Err(err) = dialog.ehlo_or_helo(&host_str).await {
		dialog.fail(pool);
		return Err(err);
	}
	if profile.require_tls {
		if let Err(err) = dialog.maybe_starttls(&host_str).await {
			dialog.fail(pool);
			return Err(err);
		}
	}

	Ok(dialog)
}

async fn connect_stream(
	proxy: &Option<ProxyHandle>,
	host: &str,
	port: u16,
) -> Result<BoxedStream, String> {
	match proxy {
		Some(handle) => {
			let proxy_addr = (handle.host.as_str(), handle.port);
			let stream = match (&handle.user, &handle.pass) {
				(Some(user), Some(pass)) => Socks5Stream::connect_with_password(
					proxy_addr,
					host.to_string(),
					port,
					user.clone(),
					pass.clone(),
					Socks5Config::default(),
				)
				.await
				.map_err(|e| e.to_string())?,
				_ => Socks5Stream::connect(proxy_addr, host.to_string(), port, Socks5Config::default())
					.await
					.map_err(|e| e.to_string())?,
			};
			Ok(Box::new(stream))
		}
		None => {
			let stream = TcpStream::connect((host, port)).await.map_err(|e| e.to_string())?;
			Ok(Box::new(stream))
		}
	}
}

impl Dialog {
	/// Mark the underlying proxy as failed and close the dialog. Call
	/// whenever the conversation ends without a clean cycle (§5).
	pub(crate) fn fail(&mut self, pool: &Pool) {
		self.state = DialogState::Closed;
		if let Some(handle) = self.proxy.take() {
			pool.mark_failure(&handle);
		}
	}

	/// Release the proxy slot on a clean close without penalising the proxy
	/// (§4.D step 8, §5 resource discipline).
	pub fn close(&mut self, pool: &Pool) {
		self.state = DialogState::Closed;
		if let Some(handle) = self.proxy.take() {
			pool.release(&handle);
		}
	}

	/// Mark the underlying proxy as successful. Call once a full, clean
	/// round trip (through RCPT) has completed.
	pub fn mark_proxy_success(&self, pool: &Pool) {
		if let Some(handle) = &self.proxy {
			pool.mark_success(handle);
		}
	}

	async fn write_line(&mut self, line: &str) -> Result<(), SmtpError> {
		let framed = format!("{}\r\n", line);
		let timeout = self.timeout;
		async_std::future::timeout(timeout, self.stream.get_mut().write_all(framed.as_bytes()))
			.await
			.map_err(|_| SmtpError::Transport("write timed out".to_string()))?
			.map_err(|e| SmtpError::Transport(e.to_string()))
	}

	async fn read_response(&mut self, timeout: Duration) -> Result<SmtpResponse, SmtpError> {
		let mut acc = ResponseAccumulator::new();
		loop {
			let mut line = String::new();
			let read = async_std::future::timeout(timeout, self.stream.read_line(&mut line))
				.await
				.map_err(|_| SmtpError::Transport("read timed out".to_string()))?
				.map_err(|e| SmtpError::Transport(e.to_string()))?;
			if read == 0 {
				return Err(SmtpError::Transport("connection closed unexpectedly".to_string()));
			}
			match acc.feed(&line) {
				Fed::NeedMore => continue,
				Fed::Done(response) => return Ok(response),
				Fed::Malformed(bad) => {
					return Err(SmtpError::Protocol(format!("malformed response line: {:?}", bad)))
				}
			}
		}
	}

	async fn greet(&mut self) -> Result<(), SmtpError> {
		let timeout = self.timeout;
		let resp = self.read_response(timeout).await?;
		if resp.code != 220 {
			return Err(SmtpError::Protocol(format!("bad greeting: {} {}", resp.code, resp.message)));
		}
		self.state = DialogState::Greeted;
		Ok(())
	}

	/// EHLO, falling back to HELO on non-250 (§4.D step 3).
	async fn ehlo_or_helo(&mut self, _mx_host: &str) -> Result<(), SmtpError> {
		let timeout = self.timeout;
		self.write_line(&format!("EHLO {}", self.helo_host)).await?;
		let resp = self.read_response(timeout).await?;
		if resp.code == 250 {
			self.state = DialogState::Heloed;
			return Ok(());
		}

		self.write_line(&format!("HELO {}", self.helo_host)).await?;
		let resp = self.read_response(timeout).await?;
		if resp.code != 250 {
			return Err(SmtpError::Protocol(format!(
				"EHLO and HELO both rejected: {} {}",
				resp.code, resp.message
			)));
		}
		self.state = DialogState::Heloed;
		Ok(())
	}

	/// STARTTLS upgrade. Certificate verification is disabled on purpose:
	/// the goal here is RCPT reachability, never authenticated delivery
	/// (§4.D step 4, documented ambiguity §9). This connection must never
	/// be reused to actually send mail.
	async fn maybe_starttls(&mut self, mx_host: &str) -> Result<(), SmtpError> {
		let timeout = self.timeout;
		self.write_line("STARTTLS").await?;
		let resp = self.read_response(timeout).await?;
		if resp.code != 220 {
			// Not fatal: some servers simply don't support it even when a
			// profile prefers TLS. Carry on in plaintext.
			log::debug!("STARTTLS refused by {}: {} {}", mx_host, resp.code, resp.message);
			return Ok(());
		}

		let inner = self.take_plain_stream();
		let connector = TlsConnector::new()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true);
		let tls_stream = connector
			.connect(mx_host, inner)
			.await
			.map_err(|e| SmtpError::Transport(format!("TLS upgrade failed: {}", e)))?;
		self.stream = BufReader::new(Box::new(tls_stream));
		self.tls = true;

		// Re-EHLO after the upgrade, as capabilities may differ over TLS.
		self.ehlo_or_helo(mx_host).await
	}

	fn take_plain_stream(&mut self) -> BoxedStream {
		// Swap out the current reader's inner stream; `self.stream` is
		// immediately overwritten once the TLS handshake completes.
		let placeholder: BoxedStream = Box::new(std::io::Cursor::new(Vec::<u8>::new()));
		std::mem::replace(&mut self.stream, BufReader::new(placeholder)).into_inner()
	}

	/// `MAIL FROM:<synthesized-sender>` (§4.D step 5).
	pub async fn mail_from(&mut self) -> Result<(), SmtpError> {
		let timeout = self.timeout;
		let from = sender::synthesize_sender();
		self.write_line(&format!("MAIL FROM:<{}>", from)).await?;
		let resp = self.read_response(timeout).await?;
		if resp.code != 250 {
			return Err(SmtpError::Protocol(format!(
				"MAIL FROM rejected: {} {}",
				resp.code, resp.message
			)));
		}
		self.state = DialogState::MailFromAccepted;
		Ok(())
	}

	/// `RCPT TO:<email>` (§4.D step 6), classified per the code table.
	pub async fn rcpt(&mut self, email: &str) -> Result<RcptResult, SmtpError> {
		let timeout = self.timeout;
		self.write_line(&format!("RCPT TO:<{}>", email)).await?;
		let resp = self.read_response(timeout).await?;
		self.state = DialogState::RcptEvaluated;
		Ok(RcptResult {
			outcome: classify_rcpt(resp.code),
			code: resp.code,
			message: resp.message,
		})
	}

	/// Best-effort QUIT with a short timeout; any error here is ignored
	/// (§4.D step 7).
	pub async fn quit(&mut self) {
		let _ = self.write_line("QUIT").await;
		let _ = self.read_response(Duration::from_secs(1)).await;
	}

	pub fn state(&self) -> DialogState {
		self.state
	}

	pub fn is_tls(&self) -> bool {
		self.tls
	}
}

#[cfg(test)]
mod tests {
	use super::response::{classify_rcpt, RcptOutcome};

	#[test]
	fn rcpt_421_is_unknown_not_rejected() {
		// Boundary case from §8: `421 try later` must classify as transient
		// transport-ish noise, never as a mailbox rejection.
		assert_eq!(classify_rcpt(421), RcptOutcome::Unknown);
	}
}
