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

//! A deliverability validation engine: probes an email address over SMTP's
//! `RCPT TO` step to learn whether a mailbox is likely to accept mail,
//! without ever sending anything.
//!
//! The three entry points a caller needs are [`validate_one`],
//! [`validate_many`] and [`validate_stream`]. Everything else here is the
//! machinery behind them: DNS (`dns`), provider-specific behaviour
//! (`provider`), SOCKS5 proxy rotation (`proxy`), the SMTP dialog (`smtp`),
//! mailbox verification (`verifier`), the staged pipeline (`validator`),
//! batch scheduling (`batch`) and CSV bulk I/O (`csv_row`).

pub mod address;
pub mod batch;
pub mod config;
pub mod csv_row;
pub mod dns;
pub mod error;
pub mod provider;
pub mod proxy;
pub mod result;
pub mod smtp;
pub mod validator;
pub mod verifier;

use std::sync::Arc;

pub use batch::{CancellationToken, ProgressEvent};
pub use config::Config;
pub use dns::Resolver;
pub use error::ValidationError;
pub use proxy::Pool;
pub use result::ValidationResult;

/// Validate a single address (§4.H).
pub async fn validate_one(email: &str, pool: &Pool, resolver: &dyn Resolver) -> ValidationResult {
	validator::validate(email, pool, resolver).await
}

/// Validate a fixed list of addresses and wait for every result, in input
/// order (§4.H). For progress reporting, use [`validate_stream`] instead.
pub async fn validate_many(emails: Vec<String>, pool: Arc<Pool>, resolver: Arc<dyn Resolver>) -> Vec<ValidationResult> {
	let rx = batch::run(emails, pool, resolver, CancellationToken::new()).await;
	let mut all_results = Vec::new();
	while let Ok(event) = rx.recv().await {
		match event {
			ProgressEvent::Complete { all_results: results } => {
				all_results = results;
				break;
			}
			ProgressEvent::Error { message } => {
				log::warn!("validate_many aborted: {}", message);
				break;
			}
			ProgressEvent::Progress { .. } => continue,
		}
	}
	all_results
}

/// Validate a list of addresses, returning the progress channel directly so
/// a caller (e.g. the HTTP adapter) can stream updates as batches complete
/// (§4.G, §4.H).
pub async fn validate_stream(
	emails: Vec<String>,
	pool: Arc<Pool>,
	resolver: Arc<dyn Resolver>,
	cancel: CancellationToken,
) -> async_std::channel::Receiver<ProgressEvent> {
	batch::run(emails, pool, resolver, cancel).await
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dns::stub::StubResolver;

	#[async_std::test]
	async fn validate_one_rejects_malformed_address() {
		let pool = Pool::empty();
		let resolver = StubResolver::default();
		let result = validate_one("not-an-email", &pool, &resolver).await;
		assert!(!result.valid);
	}

	#[async_std::test]
	async fn validate_many_preserves_order_for_an_all_malformed_batch() {
		let pool = Arc::new(Pool::empty());
		let resolver: Arc<dyn Resolver> = Arc::new(StubResolver::default());
		let emails = vec!["a".to_string(), "b".to_string(), "c".to_string()];
		let results = validate_many(emails.clone(), pool, resolver).await;
		assert_eq!(results.len(), 3);
		for (result, email) in results.iter().zip(emails.iter()) {
			assert_eq!(&result.email, email);
		}
	}
}
