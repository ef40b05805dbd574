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

//! Synthesises the `MAIL FROM:` sender address (§4.D step 5) and the
//! random local-part used for catch-all probing (§4.E).

use rand::distributions::Alphanumeric;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Domains known not to trigger spam filters on the verifying side, used as
/// the sender domain so `MAIL FROM` doesn't get bounced by the destination
/// before we even reach RCPT.
const REPUTABLE_SENDER_DOMAINS: &[&str] = &[
	"salesforce.com",
	"sendgrid.net",
	"mailchimp.com",
	"amazonses.com",
	"postmarkapp.com",
];

fn random_token(len: usize) -> String {
	let mut rng = SmallRng::from_entropy();
	std::iter::repeat(())
		.map(|()| rng.sample(Alphanumeric))
		.map(char::from)
		.take(len)
		.collect()
}

/// `verify.<random-token>@<reputable-domain>`, domain chosen uniformly at
/// random from [`REPUTABLE_SENDER_DOMAINS`].
pub fn synthesize_sender() -> String {
	let mut rng = SmallRng::from_entropy();
	let domain = REPUTABLE_SENDER_DOMAINS[rng.gen_range(0..REPUTABLE_SENDER_DOMAINS.len())];
	format!("verify.{}@{}", random_token(10), domain)
}

/// A 16-hex-char random local part for the catch-all probe (§4.E), at
/// `domain`.
pub fn synthesize_catch_all_probe(domain: &str) -> String {
	let token: String = {
		let mut rng = SmallRng::from_entropy();
		std::iter::repeat(())
			.map(|()| format!("{:x}", rng.gen_range(0..16u8)))
			.take(16)
			.collect()
	};
	format!("{}@{}", token, domain)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sender_uses_a_reputable_domain() {
		for _ in 0..20 {
			let sender = synthesize_sender();
			let domain = sender.split('@').nth(1).expect("has a domain part");
			assert!(REPUTABLE_SENDER_DOMAINS.contains(&domain));
			assert!(sender.starts_with("verify."));
		}
	}

	#[test]
	fn catch_all_probe_is_16_hex_chars_at_domain() {
		let probe = synthesize_catch_all_probe("example.com");
		let (local, domain) = probe.split_once('@').expect("has an at sign");
		assert_eq!(local.len(), 16);
		assert!(local.chars().all(|c| c.is_ascii_hexdigit()));
		assert_eq!(domain, "example.com");
	}
}
