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

//! Provider Registry (§4.A): maps a domain to the `ProviderProfile` that
//! governs timeouts, TLS policy, accept/reject codes and retry behaviour for
//! that destination.

use once_cell::sync::Lazy;
use std::time::Duration;

/// Immutable per-provider behaviour. Looked up once per validation and
/// shared as a `'static` reference — profiles never change after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
	pub name: &'static str,
	pub timeout_ms: u64,
	pub require_tls: bool,
	pub reject_catch_all: bool,
	pub accept_codes: &'static [u16],
	pub reject_codes: &'static [(u16, u16)],
	pub retry_attempts: usize,
	pub helo_host: Option<&'static str>,
	pub custom_validation: bool,
	/// MX hostnames used to recognise this provider when the recipient
	/// domain itself doesn't match (e.g. a vanity domain whose MX records
	/// point at Google Workspace).
	mx_domains: &'static [&'static str],
}

impl ProviderProfile {
	pub fn timeout(&self) -> Duration {
		Duration::from_millis(self.timeout_ms)
	}

	/// Is `code` one of this profile's accept codes?
	pub fn accepts(&self, code: u16) -> bool {
		self.accept_codes.contains(&code)
	}

	/// Is `code` inside one of this profile's reject ranges (inclusive)?
	pub fn rejects(&self, code: u16) -> bool {
		self.reject_codes.iter().any(|(lo, hi)| code >= *lo && code <= *hi)
	}
}

const GENERIC: ProviderProfile = ProviderProfile {
	name: "generic",
	timeout_ms: 10_000,
	require_tls: false,
	reject_catch_all: true,
	accept_codes: &[250, 251, 252],
	reject_codes: &[(550, 554)],
	retry_attempts: 2,
	helo_host: None,
	custom_validation: false,
	mx_domains: &[],
};

const GMAIL: ProviderProfile = ProviderProfile {
	name: "gmail.com",
	timeout_ms: 15_000,
	require_tls: true,
	reject_catch_all: true,
	accept_codes: &[250, 251, 252],
	reject_codes: &[(550, 554)],
	retry_attempts: 2,
	helo_host: None,
	custom_validation: false,
	mx_domains: &["google.com", "googlemail.com"],
};

const OUTLOOK: ProviderProfile = ProviderProfile {
	name: "outlook.com",
	timeout_ms: 30_000,
	require_tls: false,
	reject_catch_all: true,
	accept_codes: &[250, 251, 252],
	reject_codes: &[(550, 554)],
	retry_attempts: 3,
	helo_host: None,
	custom_validation: true,
	mx_domains: &["outlook.com", "protection.outlook.com"],
};

const YAHOO: ProviderProfile = ProviderProfile {
	name: "yahoo.com",
	timeout_ms: 12_000,
	require_tls: true,
	reject_catch_all: true,
	accept_codes: &[250, 251, 252],
	reject_codes: &[(550, 554)],
	retry_attempts: 2,
	helo_host: None,
	custom_validation: false,
	mx_domains: &["yahoodns.net"],
};

static REGISTRY: Lazy<Vec<&'static ProviderProfile>> =
	Lazy::new(|| vec![&GMAIL, &OUTLOOK, &YAHOO]);

/// Returns true iff `candidate` is `suffix` or ends with `.suffix` — a
/// DNS-label-boundary suffix match, not a raw substring match.
///
/// This is the fix for the REDESIGN FLAG in SPEC_FULL.md §9: a naive
/// `candidate.contains(suffix)` would let "evilgmail.com.attacker.net" or
/// "notgmail.com" match the "gmail.com" profile.
fn matches_suffix(candidate: &str, suffix: &str) -> bool {
	candidate == suffix || candidate.ends_with(&format!(".{}", suffix))
}

/// Does any of this profile's declared MX hostnames match `mx_host` on a
/// DNS-label boundary?
pub fn matches_mx_domain(profile: &ProviderProfile, mx_host: &str) -> bool {
	let mx_host = mx_host.trim_end_matches('.');
	profile
		.mx_domains
		.iter()
		.any(|known| matches_suffix(mx_host, known))
}

/// Look up the effective profile for `domain`, exact name match first, then
/// suffix match against declared MX hostnames of each profile, then the
/// generic fallback (§4.A).
pub fn lookup(domain: &str) -> &'static ProviderProfile {
	let domain = domain.trim_end_matches('.');
	for profile in REGISTRY.iter() {
		if matches_suffix(domain, profile.name) {
			return profile;
		}
	}
	&GENERIC
}

/// Look up the effective profile, additionally trying a suffix match of
/// `mx_hosts` against each profile's known MX hostnames. Used once the MX
/// list is known, to catch vanity domains hosted on a recognised provider.
pub fn lookup_with_mx(domain: &str, mx_hosts: &[String]) -> &'static ProviderProfile {
	let by_domain = lookup(domain);
	if by_domain.name != GENERIC.name {
		return by_domain;
	}
	for profile in REGISTRY.iter() {
		if mx_hosts.iter().any(|mx| matches_mx_domain(profile, mx)) {
			return profile;
		}
	}
	&GENERIC
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn exact_match() {
		assert_eq!(lookup("gmail.com").name, "gmail.com");
		assert_eq!(lookup("outlook.com").name, "outlook.com");
		assert_eq!(lookup("yahoo.com").name, "yahoo.com");
	}

	#[test]
	fn unknown_domain_falls_back_to_generic() {
		assert_eq!(lookup("example.com").name, "generic");
	}

	#[test]
	fn substring_lookalike_does_not_match() {
		// "notgmail.com" must NOT match the gmail.com profile just because it
		// contains "gmail.com" as a substring.
		assert_eq!(lookup("notgmail.com").name, "generic");
		assert_eq!(lookup("evilgmail.com.attacker.net").name, "generic");
	}

	#[test]
	fn mx_suffix_match_on_label_boundary() {
		let gmail = &GMAIL;
		assert!(matches_mx_domain(gmail, "aspmx.l.google.com."));
		assert!(!matches_mx_domain(gmail, "notgoogle.com"));
		assert!(!matches_mx_domain(gmail, "evilgoogle.com"));
	}

	#[test]
	fn lookup_with_mx_recognises_vanity_domain() {
		let mx_hosts = vec!["aspmx.l.google.com.".to_string()];
		let profile = lookup_with_mx("my-startup.io", &mx_hosts);
		assert_eq!(profile.name, "gmail.com");
	}
}
