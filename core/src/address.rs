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

//! The `Address` value type and the format/length stages of the validator
//! (§4.F, stages 1-2).

use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum allowed length, in octets, of the local part of an address.
pub const MAX_LOCAL_LEN: usize = 64;
/// Maximum allowed length, in octets, of the domain part of an address.
pub const MAX_DOMAIN_LEN: usize = 255;

// One alphanumeric, up to 62 of `[A-Za-z0-9._%+-]` with a trailing
// alphanumeric, `@`, a domain made of labels starting/ending alphanumeric
// with at least one dot and a TLD of >= 2 letters.
static FORMAT_RE: Lazy<Regex> = Lazy::new(|| {
	Regex::new(
		r"(?x)
		^
		[A-Za-z0-9] [A-Za-z0-9._%+\-]{0,62} [A-Za-z0-9]
		@
		([A-Za-z0-9]([A-Za-z0-9\-]*[A-Za-z0-9])?\.)+
		[A-Za-z]{2,}
		$
		",
	)
	.expect("format regex is valid")
});

/// A syntactically split email address: `local@domain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
	pub local: String,
	pub domain: String,
}

impl Address {
	/// Reconstruct the full `local@domain` string.
	pub fn as_email(&self) -> String {
		format!("{}@{}", self.local, self.domain)
	}
}

/// Parse and format-validate `email`.
///
/// Returns `None` if the address fails the format regex, or if either part
/// overflows its length bound (§3, §4.F stage 1-2, §8 boundary cases).
pub fn parse(email: &str) -> Option<Address> {
	if !email.is_ascii() {
		return None;
	}
	if !FORMAT_RE.is_match(email) {
		return None;
	}
	// The regex guarantees exactly one '@' exists in practice (local part
	// excludes '@', domain labels exclude '@'), but split defensively on the
	// last one so callers never see more than two parts.
	let at = email.rfind('@')?;
	let (local, domain_with_at) = email.split_at(at);
	let domain = &domain_with_at[1..];

	if local.len() > MAX_LOCAL_LEN || domain.len() > MAX_DOMAIN_LEN {
		return None;
	}

	Some(Address {
		local: local.to_string(),
		domain: domain.to_lowercase(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn accepts_simple_address() {
		let addr = parse("alice@example.com").expect("should parse");
		assert_eq!(addr.local, "alice");
		assert_eq!(addr.domain, "example.com");
	}

	#[test]
	fn rejects_missing_at() {
		assert!(parse("not-an-email").is_none());
	}

	#[test]
	fn rejects_missing_tld() {
		assert!(parse("alice@localhost").is_none());
	}

	#[test]
	fn local_part_boundary() {
		let local_64 = "a".repeat(63) + "b";
		assert_eq!(local_64.len(), 64);
		let email_64 = format!("{}@example.com", local_64);
		assert!(parse(&email_64).is_some());

		let local_65 = "a".repeat(64) + "b";
		assert_eq!(local_65.len(), 65);
		let email_65 = format!("{}@example.com", local_65);
		assert!(parse(&email_65).is_none());
	}

	#[test]
	fn domain_boundary() {
		// Build a 255-char domain out of dot-separated labels ending in a
		// valid two-letter TLD.
		let label = "a".repeat(60);
		let mut domain = format!("{0}.{0}.{0}.{0}", label); // 60*4 + 3 = 243
		domain.push_str(".co"); // + 4 = 247, pad below
		while domain.len() < 255 {
			domain.insert(0, 'a');
		}
		assert_eq!(domain.len(), 255);
		let email = format!("alice@{}", domain);
		assert!(parse(&email).is_some());

		let too_long = format!("a{}", domain);
		assert_eq!(too_long.len(), 256);
		let email = format!("alice@{}", too_long);
		assert!(parse(&email).is_none());
	}

	#[test]
	fn lowercases_domain() {
		let addr = parse("Alice@Example.COM").expect("should parse");
		assert_eq!(addr.domain, "example.com");
	}
}
