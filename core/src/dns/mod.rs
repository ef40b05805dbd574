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

//! DNS Resolver Facade (§4.C): a thin, failure-swallowing contract over
//! system DNS. A [`Resolver`] trait exists so the modules above can be
//! tested against a stub without a live resolver — the same seam
//! `blastrider-mailcheck_lib`'s `LookupMx` trait uses for its own resolver.

use async_std_resolver::{config, resolver, AsyncStdResolver};
use async_trait::async_trait;
use std::time::Duration;
use trust_dns_proto::rr::Name;

/// One MX record, as advertised by the domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxRecord {
	pub exchange: Name,
	pub priority: u16,
}

/// The DNS facade's contract. Implemented for the real `async-std-resolver`
/// client, and for a stub in tests.
#[async_trait]
pub trait Resolver: Send + Sync {
	/// True iff any of A, AAAA, CNAME resolves without error (§4.C).
	async fn has_address(&self, domain: &str, timeout: Duration) -> bool;
	/// MX list sorted ascending by priority, or empty on any failure
	/// (§4.C). Stable for ties (§8 boundary cases).
	async fn mx(&self, domain: &str, timeout: Duration) -> Vec<MxRecord>;
	/// First TXT record beginning with `v=spf1`, or `None` (§4.C).
	async fn spf(&self, domain: &str, timeout: Duration) -> Option<String>;
}

/// The production resolver, backed by `async-std-resolver` (the teacher
/// crate's own DNS dependency).
pub struct SystemResolver {
	inner: AsyncStdResolver,
}

impl SystemResolver {
	pub async fn from_system_conf() -> std::io::Result<Self> {
		let (conf, opts) = config::read_system_conf()?;
		let inner = resolver(conf, opts).await;
		Ok(SystemResolver { inner })
	}
}

#[async_trait]
impl Resolver for SystemResolver {
	async fn has_address(&self, domain: &str, timeout: Duration) -> bool {
		let a = async_std::future::timeout(timeout, self.inner.ipv4_lookup(domain));
		let aaaa = async_std::future::timeout(timeout, self.inner.ipv6_lookup(domain));
		let cname = async_std::future::timeout(timeout, self.inner.lookup(domain, trust_dns_proto::rr::RecordType::CNAME));

		// Parallel issue; any success wins (§4.C).
		let (a, aaaa, cname) = futures::join!(a, aaaa, cname);
		matches!(a, Ok(Ok(_))) || matches!(aaaa, Ok(Ok(_))) || matches!(cname, Ok(Ok(_)))
	}

	async fn mx(&self, domain: &str, timeout: Duration) -> Vec<MxRecord> {
		match async_std::future::timeout(timeout, self.inner.mx_lookup(domain)).await {
			Ok(Ok(lookup)) => {
				let mut records: Vec<MxRecord> = lookup
					.iter()
					.map(|mx| MxRecord {
						exchange: mx.exchange().clone(),
						priority: mx.preference(),
					})
					.collect();
				records.sort_by_key(|r| r.priority);
				records
			}
			_ => Vec::new(),
		}
	}

	async fn spf(&self, domain: &str, timeout: Duration) -> Option<String> {
		match async_std::future::timeout(timeout, self.inner.txt_lookup(domain)).await {
			Ok(Ok(lookup)) => lookup.iter().find_map(|txt| {
				let joined = txt
					.iter()
					.map(|bytes| String::from_utf8_lossy(bytes).into_owned())
					.collect::<Vec<_>>()
					.join("");
				if joined.to_lowercase().starts_with("v=spf1") {
					Some(joined)
				} else {
					None
				}
			}),
			_ => None,
		}
	}
}

#[cfg(any(test, feature = "test-util"))]
pub mod stub {
	use super::*;
	use std::collections::HashMap;

	/// An in-memory resolver for tests: no network access, deterministic.
	#[derive(Default)]
	pub struct StubResolver {
		pub addresses: HashMap<String, bool>,
		pub mx_records: HashMap<String, Vec<MxRecord>>,
		pub spf_records: HashMap<String, String>,
	}

	#[async_trait]
	impl Resolver for StubResolver {
		async fn has_address(&self, domain: &str, _timeout: Duration) -> bool {
			*self.addresses.get(domain).unwrap_or(&false)
		}

		async fn mx(&self, domain: &str, _timeout: Duration) -> Vec<MxRecord> {
			self.mx_records.get(domain).cloned().unwrap_or_default()
		}

		async fn spf(&self, domain: &str, _timeout: Duration) -> Option<String> {
			self.spf_records.get(domain).cloned()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::stub::StubResolver;
	use super::*;
	use std::str::FromStr;

	#[async_std::test]
	async fn mx_sorted_ascending_and_stable_for_ties() {
		let mut resolver = StubResolver::default();
		resolver.mx_records.insert(
			"example.com".to_string(),
			vec![
				MxRecord { exchange: Name::from_str("mx-b.example.com.").unwrap(), priority: 10 },
				MxRecord { exchange: Name::from_str("mx-a.example.com.").unwrap(), priority: 10 },
				MxRecord { exchange: Name::from_str("mx-c.example.com.").unwrap(), priority: 5 },
			],
		);
		let records = resolver.mx("example.com", Duration::from_secs(1)).await;
		assert_eq!(records[0].priority, 5);
		// Ties keep their original relative order (stable sort).
		assert_eq!(records[1].exchange.to_string(), "mx-b.example.com.");
		assert_eq!(records[2].exchange.to_string(), "mx-a.example.com.");
	}

	#[async_std::test]
	async fn missing_domain_yields_empty_mx_and_no_address() {
		let resolver = StubResolver::default();
		assert!(resolver.mx("nonexistent.invalid", Duration::from_secs(1)).await.is_empty());
		assert!(!resolver.has_address("nonexistent.invalid", Duration::from_secs(1)).await);
		assert!(resolver.spf("nonexistent.invalid", Duration::from_secs(1)).await.is_none());
	}

	#[async_std::test]
	async fn spf_only_matches_v_spf1_prefix() {
		let mut resolver = StubResolver::default();
		resolver
			.spf_records
			.insert("example.com".to_string(), "v=spf1 include:_spf.example.com ~all".to_string());
		let spf = resolver.spf("example.com", Duration::from_secs(1)).await;
		assert_eq!(spf.unwrap(), "v=spf1 include:_spf.example.com ~all");
	}
}
