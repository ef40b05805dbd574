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

//! SMTP line framing and response parsing (§4.D).
//!
//! A response is complete when a line matching `^[0-9]{3}([ -].*)?$` is
//! observed with a space (not a dash) after the code: `NNN-...`
//! continuation lines are consumed, the terminating `NNN ...` line carries
//! the final message.

use once_cell::sync::Lazy;
use regex::Regex;

static RESPONSE_LINE_RE: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^([0-9]{3})([ -])(.*)$").expect("response regex is valid"));

/// One complete (possibly multi-line) SMTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpResponse {
	pub code: u16,
	pub message: String,
}

impl SmtpResponse {
	pub fn is_positive(&self) -> bool {
		(200..300).contains(&self.code)
	}
}

/// Parsing state fed one CRLF-terminated line at a time.
#[derive(Debug, Default)]
pub struct ResponseAccumulator {
	lines: Vec<String>,
	code: Option<u16>,
}

/// What happened after feeding one line into the accumulator.
pub enum Fed {
	/// More lines are expected (a `NNN-...` continuation was seen).
	NeedMore,
	/// The response is complete.
	Done(SmtpResponse),
	/// The line didn't look like an SMTP response line at all.
	Malformed(String),
}

impl ResponseAccumulator {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn feed(&mut self, line: &str) -> Fed {
		let trimmed = line.trim_end_matches(['\r', '\n']);
		let caps = match RESPONSE_LINE_RE.captures(trimmed) {
			Some(caps) => caps,
			None => return Fed::Malformed(trimmed.to_string()),
		};

		let code: u16 = match caps[1].parse() {
			Ok(code) => code,
			Err(_) => return Fed::Malformed(trimmed.to_string()),
		};
		let sep = &caps[2];
		let text = caps[3].to_string();

		if let Some(first_code) = self.code {
			if first_code != code {
				// A provider changing codes mid-response is nonsensical;
				// treat the new line as authoritative rather than erroring.
				self.code = Some(code);
			}
		} else {
			self.code = Some(code);
		}
		self.lines.push(text);

		if sep == "-" {
			Fed::NeedMore
		} else {
			Fed::Done(SmtpResponse {
				code: self.code.expect("set above"),
				message: self.lines.join(" "),
			})
		}
	}
}

/// What the RCPT response means for mailbox existence (§4.D code table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RcptOutcome {
	/// `2xx`: mailbox accepted.
	Exists,
	/// `451`/`452`: treated as "likely exists" — many providers greylist
	/// unknown senders (documented ambiguity, §9).
	LikelyExistsGreylisted,
	/// `550`-`554`: mailbox rejected.
	Rejected,
	/// Any other `4xx`/`5xx`.
	Unknown,
}

pub fn classify_rcpt(code: u16) -> RcptOutcome {
	match code {
		200..=299 => RcptOutcome::Exists,
		451 | 452 => RcptOutcome::LikelyExistsGreylisted,
		550..=554 => RcptOutcome::Rejected,
		_ => RcptOutcome::Unknown,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn single_line_response() {
		let mut acc = ResponseAccumulator::new();
		match acc.feed("220 mx.example.com ESMTP ready\r\n") {
			Fed::Done(resp) => {
				assert_eq!(resp.code, 220);
				assert_eq!(resp.message, "mx.example.com ESMTP ready");
			}
			_ => panic!("expected Done"),
		}
	}

	#[test]
	fn multiline_ehlo_response_terminated_by_space() {
		let mut acc = ResponseAccumulator::new();
		assert!(matches!(acc.feed("250-mx.example.com Hello\r\n"), Fed::NeedMore));
		assert!(matches!(acc.feed("250-PIPELINING\r\n"), Fed::NeedMore));
		assert!(matches!(acc.feed("250-STARTTLS\r\n"), Fed::NeedMore));
		match acc.feed("250 END\r\n") {
			Fed::Done(resp) => assert_eq!(resp.code, 250),
			_ => panic!("expected Done after terminating line"),
		}
	}

	#[test]
	fn malformed_line_is_reported() {
		let mut acc = ResponseAccumulator::new();
		assert!(matches!(acc.feed("not a response"), Fed::Malformed(_)));
	}

	#[test]
	fn rcpt_classification_matches_spec_table() {
		assert_eq!(classify_rcpt(250), RcptOutcome::Exists);
		assert_eq!(classify_rcpt(251), RcptOutcome::Exists);
		assert_eq!(classify_rcpt(451), RcptOutcome::LikelyExistsGreylisted);
		assert_eq!(classify_rcpt(452), RcptOutcome::LikelyExistsGreylisted);
		assert_eq!(classify_rcpt(550), RcptOutcome::Rejected);
		assert_eq!(classify_rcpt(554), RcptOutcome::Rejected);
		assert_eq!(classify_rcpt(421), RcptOutcome::Unknown);
		assert_eq!(classify_rcpt(421), RcptOutcome::Unknown); // 421 is transport-ish, not a reject
	}
}
