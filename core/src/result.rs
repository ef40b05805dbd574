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

//! The `ValidationResult` data model (§3) produced at the end of the
//! pipeline, and the wire shape it's serialised to (§6).

use serde::{Deserialize, Serialize};

/// Which stages of the pipeline ran and passed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checks {
	pub format: bool,
	pub dns: bool,
	pub mx: bool,
	pub spf: bool,
	pub smtp: bool,
	pub mailbox: bool,
	#[serde(rename = "catchAll")]
	pub catch_all: bool,
}

/// Ancillary evidence gathered along the way, useful for debugging a
/// negative result even when it isn't gating.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Details {
	#[serde(rename = "mxRecords")]
	pub mx_records: Vec<String>,
	#[serde(rename = "spfRecord")]
	pub spf_record: Option<String>,
	#[serde(rename = "smtpResponse")]
	pub smtp_response: Option<SmtpResponseDetails>,
}

/// The raw SMTP code/message the final RCPT probe returned, surfaced so
/// callers can override the `451`/`452` "likely exists" heuristic (§9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpResponseDetails {
	pub code: u16,
	pub message: String,
}

/// The end result of validating one address (§3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
	pub email: String,
	pub valid: bool,
	pub reason: String,
	pub checks: Checks,
	pub details: Details,
}

impl ValidationResult {
	/// A result that stopped at a given stage, all later checks left at
	/// their `false` default (§4.F: "no later stage runs").
	pub fn failed(email: impl Into<String>, reason: impl Into<String>, checks: Checks) -> Self {
		ValidationResult {
			email: email.into(),
			valid: false,
			reason: reason.into(),
			checks,
			details: Details::default(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn format_failure_clears_all_other_checks() {
		let result = ValidationResult::failed("not-an-email", "Invalid email format", Checks::default());
		assert!(!result.valid);
		assert!(!result.checks.format);
		assert!(!result.checks.dns);
		assert!(!result.checks.mx);
		assert!(!result.checks.smtp);
		assert!(!result.checks.mailbox);
		assert_eq!(result.reason, "Invalid email format");
	}

	#[test]
	fn wire_shape_uses_camel_case_catch_all() {
		let checks = Checks { catch_all: true, ..Default::default() };
		let json = serde_json::to_value(&checks).unwrap();
		assert_eq!(json["catchAll"], serde_json::json!(true));
	}
}
