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

//! Mailbox Verifier (§4.E): drives the SMTP dialog over the MX list for one
//! address, interprets the RCPT outcome, detects catch-all domains, and
//! retries per a provider-specific [`RetryStrategy`].
//!
//! The original crate interleaved retry loops with connection cleanup in
//! nested try/finally; here that's pulled apart into an explicit strategy
//! object (`{attempts, backoff(attempt)}`) plus a plain loop, per the
//! design note in SPEC_FULL.md §9.

use std::time::Duration;

use crate::dns::MxRecord;
use crate::error::SmtpError;
use crate::provider::ProviderProfile;
use crate::proxy::Pool;
use crate::result::SmtpResponseDetails;
use crate::smtp::{self, response::RcptOutcome};

/// Base unit every backoff is scaled from.
const RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy)]
enum BackoffKind {
	Linear,
	Exponential,
}

/// `{attempts, backoff(attempt) -> Duration}`, selected per-profile
/// (§4.E, §9).
#[derive(Debug, Clone, Copy)]
pub struct RetryStrategy {
	pub attempts: usize,
	kind: BackoffKind,
}

impl RetryStrategy {
	/// Linear backoff `RETRY_DELAY * attempt`, `retry_attempts` tries
	/// (default 3). Used by every profile except the Outlook family.
	pub fn linear(attempts: usize) -> Self {
		RetryStrategy { attempts: attempts.max(1), kind: BackoffKind::Linear }
	}

	/// Exponential backoff `RETRY_DELAY * 2^attempt`, up to
	/// `max(retry_attempts, 5)` tries. Used when `custom_validation` is set
	/// (Outlook family).
	pub fn exponential(attempts: usize) -> Self {
		RetryStrategy { attempts: attempts.max(5), kind: BackoffKind::Exponential }
	}

	pub fn for_profile(profile: &ProviderProfile) -> Self {
		if profile.custom_validation {
			RetryStrategy::exponential(profile.retry_attempts)
		} else {
			RetryStrategy::linear(profile.retry_attempts)
		}
	}

	/// Delay to sleep before attempt number `attempt` (1-indexed).
	pub fn backoff(&self, attempt: usize) -> Duration {
		match self.kind {
			BackoffKind::Linear => RETRY_DELAY * attempt as u32,
			BackoffKind::Exponential => RETRY_DELAY * 2u32.pow(attempt as u32),
		}
	}
}

/// What the Mailbox Verifier learned about one address.
#[derive(Debug, Clone)]
pub struct MailboxOutcome {
	pub mailbox_exists: bool,
	pub is_catch_all: bool,
	pub smtp_response: Option<SmtpResponseDetails>,
	/// Set when every dial attempt failed because the proxy pool itself was
	/// exhausted, rather than because of a per-connection transport error.
	/// The pool is global state, so there's no point trying further MX hosts
	/// once this happens (§7).
	pub proxy_exhausted: bool,
}

/// Iterate `mx_list` in priority order, probing RCPT with retries, and
/// detect catch-all once a positive result is seen (§4.E).
pub async fn verify_mailbox(
	pool: &Pool,
	mx_list: &[MxRecord],
	address: &str,
	domain: &str,
	profile: &ProviderProfile,
) -> MailboxOutcome {
	let strategy = RetryStrategy::for_profile(profile);
	let mut last_response: Option<SmtpResponseDetails> = None;

	for mx in mx_list {
		for attempt in 1..=strategy.attempts {
			if attempt > 1 {
				async_std::task::sleep(strategy.backoff(attempt - 1)).await;
			}

			let mut dialog = match smtp::dial(pool, &mx.exchange, 25, profile, domain).await {
				Ok(dialog) => dialog,
				Err(SmtpError::ProxyExhausted) => {
					log::warn!("email={} proxy pool exhausted, aborting verification", address);
					return MailboxOutcome {
						mailbox_exists: false,
						is_catch_all: false,
						smtp_response: last_response,
						proxy_exhausted: true,
					};
				}
				Err(err) => {
					log::debug!(
						"email={} mx={} attempt={} dial failed: {}",
						address,
						mx.exchange,
						attempt,
						err
					);
					continue;
				}
			};

			if let Err(err) = dialog.mail_from().await {
				log::debug!("email={} mx={} MAIL FROM failed: {}", address, mx.exchange, err);
				dialog.fail(pool);
				continue;
			}

			let rcpt = match dialog.rcpt(address).await {
				Ok(rcpt) => rcpt,
				Err(err) => {
					log::debug!("email={} mx={} RCPT failed: {}", address, mx.exchange, err);
					dialog.fail(pool);
					continue;
				}
			};

			last_response = Some(SmtpResponseDetails { code: rcpt.code, message: rcpt.message.clone() });

			match rcpt.outcome {
				RcptOutcome::Rejected => {
					dialog.mark_proxy_success(pool);
					dialog.quit().await;
					dialog.close(pool);
					return MailboxOutcome {
						mailbox_exists: false,
						is_catch_all: false,
						smtp_response: last_response,
						proxy_exhausted: false,
					};
				}
				RcptOutcome::Exists | RcptOutcome::LikelyExistsGreylisted => {
					let probe_local = smtp::sender::synthesize_catch_all_probe(domain);
					let is_catch_all = match dialog.rcpt(&probe_local).await {
						Ok(probe_rcpt) => probe_rcpt.exists(),
						Err(_) => false,
					};
					dialog.mark_proxy_success(pool);
					dialog.quit().await;
					dialog.close(pool);
					return MailboxOutcome {
						mailbox_exists: true,
						is_catch_all,
						smtp_response: last_response,
						proxy_exhausted: false,
					};
				}
				RcptOutcome::Unknown => {
					dialog.quit().await;
					dialog.close(pool);
					// Inconclusive: retry this MX (bounded by the strategy),
					// then fall through to the next one.
					continue;
				}
			}
		}
	}

	MailboxOutcome {
		mailbox_exists: false,
		is_catch_all: false,
		smtp_response: last_response,
		proxy_exhausted: false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::provider;

	#[test]
	fn generic_profile_uses_linear_backoff() {
		let profile = provider::lookup("example.com");
		let strategy = RetryStrategy::for_profile(profile);
		assert_eq!(strategy.attempts, profile.retry_attempts);
		assert_eq!(strategy.backoff(1), RETRY_DELAY);
		assert_eq!(strategy.backoff(2), RETRY_DELAY * 2);
	}

	#[test]
	fn outlook_profile_uses_exponential_backoff_and_wider_budget() {
		let profile = provider::lookup("outlook.com");
		let strategy = RetryStrategy::for_profile(profile);
		assert!(strategy.attempts >= 5);
		assert_eq!(strategy.backoff(1), RETRY_DELAY * 2);
		assert_eq!(strategy.backoff(2), RETRY_DELAY * 4);
	}
}
