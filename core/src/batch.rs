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

//! Batch Scheduler (§4.G): validates a list of addresses in fixed-size
//! batches, reporting progress over a channel and preserving input order in
//! the final result set.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_std::channel::{self, Receiver, Sender};

use crate::dns::Resolver;
use crate::proxy::Pool;
use crate::result::ValidationResult;
use crate::validator;

/// How many addresses run concurrently per batch.
pub const BATCH_SIZE: usize = 5;
/// Pause between batches, easing off on the destination mail servers.
pub const BATCH_DELAY: Duration = Duration::from_secs(2);
/// Per-item retry budget for validations that error out rather than produce
/// a definite `ValidationResult` (e.g. a panicking resolver implementation).
const MAX_RETRIES: usize = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Emitted on the batch scheduler's channel as the run progresses.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
	/// One batch finished. `fraction` is `completed / total`, in `[0, 1]`.
	Progress { fraction: f64, batch_results: Vec<ValidationResult> },
	/// Every item has been validated, in original input order.
	Complete { all_results: Vec<ValidationResult> },
	/// The run was aborted before completion.
	Error { message: String },
}

/// A handle a caller can use to cancel an in-flight batch run.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}
}

/// Validate `emails` in batches of [`BATCH_SIZE`], sending a [`ProgressEvent`]
/// after each batch and a final `Complete`/`Error` event. Cancellation is
/// checked at batch boundaries, never mid-batch, so a batch already dialing
/// out always finishes cleanly (§4.G).
pub async fn run(
	emails: Vec<String>,
	pool: Arc<Pool>,
	resolver: Arc<dyn Resolver>,
	cancel: CancellationToken,
) -> Receiver<ProgressEvent> {
	let (tx, rx) = channel::unbounded();
	async_std::task::spawn(drive(emails, pool, resolver, cancel, tx));
	rx
}

async fn drive(
	emails: Vec<String>,
	pool: Arc<Pool>,
	resolver: Arc<dyn Resolver>,
	cancel: CancellationToken,
	tx: Sender<ProgressEvent>,
) {
	let total = emails.len();
	if total == 0 {
		let _ = tx.send(ProgressEvent::Complete { all_results: Vec::new() }).await;
		return;
	}

	let mut all_results = Vec::with_capacity(total);
	let mut completed = 0usize;

	for chunk in emails.chunks(BATCH_SIZE) {
		if cancel.is_cancelled() {
			let _ = tx.send(ProgressEvent::Error { message: "validation run cancelled".to_string() }).await;
			return;
		}

		let futures = chunk.iter().map(|email| validate_with_retries(email.clone(), &pool, &resolver));
		let batch_results: Vec<ValidationResult> = futures::future::join_all(futures).await;

		completed += batch_results.len();
		all_results.extend(batch_results.clone());

		let fraction = completed as f64 / total as f64;
		if tx.send(ProgressEvent::Progress { fraction, batch_results }).await.is_err() {
			// Receiver dropped: nobody's listening any more, stop working.
			return;
		}

		if completed < total {
			async_std::task::sleep(BATCH_DELAY).await;
		}
	}

	let _ = tx.send(ProgressEvent::Complete { all_results }).await;
}

/// Run [`validator::validate`], retrying up to [`MAX_RETRIES`] times with a
/// linear delay when the result looks transient: the address is well-formed
/// and resolved to an MX host, but no SMTP response was ever obtained (a
/// dropped connection, a proxy exhaustion, a timeout). A malformed address,
/// a missing domain/MX, or any result that did get an SMTP response — accept,
/// reject, or catch-all — is final on the first attempt and never retried.
async fn validate_with_retries(email: String, pool: &Pool, resolver: &Arc<dyn Resolver>) -> ValidationResult {
	let mut attempt = 0;
	loop {
		attempt += 1;
		let result = validator::validate(&email, pool, resolver.as_ref()).await;
		let transient = result.checks.format && result.checks.mx && !result.checks.smtp;
		if !transient || attempt >= MAX_RETRIES {
			return result;
		}
		async_std::task::sleep(RETRY_DELAY * attempt as u32).await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dns::stub::StubResolver;
	use std::str::FromStr;
	use std::time::Instant;
	use trust_dns_proto::rr::Name;

	#[async_std::test]
	async fn malformed_input_is_never_retried() {
		let pool = Pool::empty();
		let resolver: Arc<dyn Resolver> = Arc::new(StubResolver::default());
		let started = Instant::now();
		let result = validate_with_retries("not-an-email".to_string(), &pool, &resolver).await;
		assert!(!result.valid);
		assert!(started.elapsed() < RETRY_DELAY);
	}

	#[async_std::test]
	async fn unreachable_mx_is_retried_up_to_the_budget() {
		let pool = Pool::empty();
		let mut stub = StubResolver::default();
		stub.addresses.insert("example.com".to_string(), true);
		stub.mx_records.insert(
			"example.com".to_string(),
			vec![crate::dns::MxRecord { exchange: Name::from_str("mx.invalid.").unwrap(), priority: 10 }],
		);
		let resolver: Arc<dyn Resolver> = Arc::new(stub);

		let started = Instant::now();
		let result = validate_with_retries("alice@example.com".to_string(), &pool, &resolver).await;
		assert!(!result.valid);
		assert!(result.checks.format && result.checks.mx && !result.checks.smtp);
		// MAX_RETRIES - 1 sleeps of RETRY_DELAY * attempt each (1 + 2 = 3 units).
		assert!(started.elapsed() >= RETRY_DELAY * 3);
	}

	#[async_std::test]
	async fn preserves_input_order_across_batches() {
		let emails: Vec<String> = (0..12).map(|i| format!("not-an-email-{}", i)).collect();
		let pool = Arc::new(Pool::empty());
		let resolver: Arc<dyn Resolver> = Arc::new(StubResolver::default());
		let rx = run(emails.clone(), pool, resolver, CancellationToken::new()).await;

		let mut all_results = Vec::new();
		while let Ok(event) = rx.recv().await {
			if let ProgressEvent::Complete { all_results: results } = event {
				all_results = results;
				break;
			}
		}

		assert_eq!(all_results.len(), emails.len());
		for (result, email) in all_results.iter().zip(emails.iter()) {
			assert_eq!(&result.email, email);
		}
	}

	#[async_std::test]
	async fn empty_input_completes_immediately_with_no_results() {
		let pool = Arc::new(Pool::empty());
		let resolver: Arc<dyn Resolver> = Arc::new(StubResolver::default());
		let rx = run(Vec::new(), pool, resolver, CancellationToken::new()).await;
		match rx.recv().await {
			Ok(ProgressEvent::Complete { all_results }) => assert!(all_results.is_empty()),
			other => panic!("expected immediate Complete, got {:?}", other),
		}
	}

	#[async_std::test]
	async fn cancellation_is_observed_at_the_next_batch_boundary() {
		let emails: Vec<String> = (0..20).map(|i| format!("not-an-email-{}", i)).collect();
		let pool = Arc::new(Pool::empty());
		let resolver: Arc<dyn Resolver> = Arc::new(StubResolver::default());
		let cancel = CancellationToken::new();
		cancel.cancel();
		let rx = run(emails, pool, resolver, cancel).await;
		match rx.recv().await {
			Ok(ProgressEvent::Error { .. }) => {}
			other => panic!("expected immediate cancellation Error, got {:?}", other),
		}
	}
}
