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

//! Email Validator (§4.F): the staged, short-circuiting pipeline that turns
//! one address into a [`ValidationResult`] — format, DNS, MX, SPF, provider
//! lookup, then mailbox verification.
//!
//! Each stage either advances `checks` and continues, or returns early via
//! [`ValidationResult::failed`] with every later check left at its `false`
//! default, per §4.F's "no later stage runs" rule.

use std::time::Duration;

use crate::address;
use crate::dns::Resolver;
use crate::error::ValidationError;
use crate::provider;
use crate::proxy::Pool;
use crate::result::{Checks, Details, ValidationResult};
use crate::verifier;

/// Timeout applied to every individual DNS lookup (§4.C).
const DNS_TIMEOUT: Duration = Duration::from_secs(5);

/// Validate one address end to end (§4.F).
pub async fn validate(email: &str, pool: &Pool, resolver: &dyn Resolver) -> ValidationResult {
	let mut checks = Checks::default();
	let mut details = Details::default();

	let address = match address::parse(email) {
		Some(address) => address,
		None => return ValidationResult::failed(email, ValidationError::MalformedInput.to_string(), checks),
	};
	checks.format = true;

	if !resolver.has_address(&address.domain, DNS_TIMEOUT).await {
		return ValidationResult::failed(email, ValidationError::NoSuchDomain.to_string(), checks);
	}
	checks.dns = true;

	let mx_list = resolver.mx(&address.domain, DNS_TIMEOUT).await;
	if mx_list.is_empty() {
		return ValidationResult::failed(email, ValidationError::NoMailServers.to_string(), checks);
	}
	checks.mx = true;
	details.mx_records = mx_list.iter().map(|mx| mx.exchange.to_string()).collect();

	// SPF is ancillary evidence only (§9): it never gates the result, just
	// rides along in `details` for a caller to inspect.
	if let Some(spf_record) = resolver.spf(&address.domain, DNS_TIMEOUT).await {
		checks.spf = true;
		details.spf_record = Some(spf_record);
	}

	let profile = provider::lookup_with_mx(&address.domain, &details.mx_records);

	let outcome =
		verifier::verify_mailbox(pool, &mx_list, &address.as_email(), &address.domain, profile).await;
	details.smtp_response = outcome.smtp_response.clone();
	checks.smtp = outcome.smtp_response.is_some();
	checks.mailbox = outcome.mailbox_exists;
	checks.catch_all = outcome.is_catch_all;

	if outcome.proxy_exhausted {
		return ValidationResult {
			email: email.to_string(),
			valid: false,
			reason: ValidationError::ProxyExhausted.to_string(),
			checks,
			details,
		};
	}

	if !outcome.mailbox_exists {
		return ValidationResult {
			email: email.to_string(),
			valid: false,
			reason: ValidationError::MailboxRejected.to_string(),
			checks,
			details,
		};
	}

	if outcome.is_catch_all && profile.reject_catch_all {
		return ValidationResult {
			email: email.to_string(),
			valid: false,
			reason: ValidationError::CatchAllRejected.to_string(),
			checks,
			details,
		};
	}

	ValidationResult { email: email.to_string(), valid: true, reason: "Email is valid".to_string(), checks, details }
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dns::stub::StubResolver;
	use std::str::FromStr;
	use trust_dns_proto::rr::Name;

	fn stub_with_mx(domain: &str, exchange: &str) -> StubResolver {
		let mut resolver = StubResolver::default();
		resolver.addresses.insert(domain.to_string(), true);
		resolver.mx_records.insert(
			domain.to_string(),
			vec![crate::dns::MxRecord { exchange: Name::from_str(exchange).unwrap(), priority: 10 }],
		);
		resolver
	}

	#[async_std::test]
	async fn malformed_address_short_circuits_before_any_dns_lookup() {
		let pool = Pool::empty();
		let resolver = StubResolver::default();
		let result = validate("not-an-email", &pool, &resolver).await;
		assert!(!result.valid);
		assert_eq!(result.reason, "Invalid email format");
		assert!(!result.checks.dns);
		assert!(!result.checks.mx);
	}

	#[async_std::test]
	async fn nonexistent_domain_stops_after_dns_stage() {
		let pool = Pool::empty();
		let resolver = StubResolver::default();
		let result = validate("alice@nonexistent.invalid", &pool, &resolver).await;
		assert!(!result.valid);
		assert_eq!(result.reason, "Domain does not exist");
		assert!(!result.checks.mx);
	}

	#[async_std::test]
	async fn domain_without_mx_records_stops_after_mx_stage() {
		let pool = Pool::empty();
		let mut resolver = StubResolver::default();
		resolver.addresses.insert("example.com".to_string(), true);
		let result = validate("alice@example.com", &pool, &resolver).await;
		assert!(!result.valid);
		assert_eq!(result.reason, "No mail servers found for domain");
		assert!(result.checks.dns);
		assert!(!result.checks.mx);
	}

	#[async_std::test]
	async fn unreachable_mx_yields_mailbox_verification_failure() {
		// No real SMTP server listens at this exchange: every dial attempt
		// will fail with a transport error, which must not panic and must
		// surface as a clean, non-fatal failure.
		let pool = Pool::empty();
		let resolver = stub_with_mx("example.com", "mx.invalid.");
		let result = validate("alice@example.com", &pool, &resolver).await;
		assert!(!result.valid);
		assert_eq!(result.reason, "Failed to verify mailbox");
		assert!(result.checks.mx);
		assert!(!result.checks.mailbox);
	}
}
