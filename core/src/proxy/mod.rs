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

//! Proxy Pool (§4.B): owns the list of SOCKS5 proxies, hands out rotating
//! handles under a cooldown and a per-proxy concurrent-connection cap, and
//! tracks per-proxy failure counts.
//!
//! This is the only globally mutable state in the engine (§5): every
//! mutation runs under one `Mutex` covering the whole pool snapshot, so no
//! caller ever observes a torn state.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

/// A proxy is dropped from rotation after this many consecutive failures,
/// until the next global reset.
pub const MAX_FAILURES: u32 = 3;
/// A proxy may not serve more than this many concurrent dials.
pub const MAX_CONNECTIONS: u32 = 3;
/// Minimum wall-clock gap between successive uses of the same proxy.
pub const COOLDOWN: chrono::Duration = chrono::Duration::seconds(30);

#[derive(Debug)]
pub enum ProxyError {
	/// Every proxy is either over its failure budget, over its connection
	/// cap, or still cooling down — even after attempting a global reset.
	Exhausted,
}

/// One configured SOCKS5 proxy and its mutable bookkeeping.
#[derive(Debug, Clone)]
struct ProxyEntry {
	host: String,
	port: u16,
	user: Option<String>,
	pass: Option<String>,
	failures: u32,
	active_connections: u32,
	last_used_at: Option<DateTime<Utc>>,
}

impl ProxyEntry {
	/// The cooldown only throttles how soon an *idle* proxy can be picked up
	/// again; a proxy that already has a connection open is governed by
	/// `MAX_CONNECTIONS` alone, not by how recently it was last acquired.
	fn eligible(&self, now: DateTime<Utc>) -> bool {
		let cooled_down = match self.last_used_at {
			Some(last) => now - last >= COOLDOWN,
			None => true,
		};
		self.failures < MAX_FAILURES
			&& self.active_connections < MAX_CONNECTIONS
			&& (self.active_connections > 0 || cooled_down)
	}
}

/// A lightweight, `Copy`-free handle to a proxy, returned from `acquire`.
/// Carries everything a dial needs without borrowing the pool.
#[derive(Debug, Clone)]
pub struct ProxyHandle {
	id: usize,
	pub host: String,
	pub port: u16,
	pub user: Option<String>,
	pub pass: Option<String>,
}

struct PoolState {
	entries: Vec<ProxyEntry>,
	cursor: usize,
}

/// Owns the proxy list and all mutable state. Share via `Arc<Pool>` across
/// concurrent batch items.
pub struct Pool {
	state: Mutex<PoolState>,
}

impl Pool {
	/// An empty pool. Legal: callers then dial directly, without a proxy.
	pub fn empty() -> Self {
		Pool {
			state: Mutex::new(PoolState {
				entries: Vec::new(),
				cursor: 0,
			}),
		}
	}

	/// Parse one `host:port[:user[:pass]]` proxy per line. Comments (`#`)
	/// and blank lines are ignored; malformed lines are skipped with a
	/// warning, never fatal (§4.B, §6).
	pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
		let contents = fs::read_to_string(path)?;
		Ok(Self::parse(&contents))
	}

	/// Parse pre-loaded proxy-file contents. Exposed separately from
	/// [`load`] so tests don't need a filesystem fixture.
	pub fn parse(contents: &str) -> Self {
		let mut entries = Vec::new();
		for raw_line in contents.lines() {
			let line = raw_line.trim();
			if line.is_empty() || line.starts_with('#') {
				continue;
			}
			match parse_proxy_line(line) {
				Some(entry) => entries.push(entry),
				None => log::warn!("skipping malformed proxy line: {:?}", raw_line),
			}
		}
		Pool {
			state: Mutex::new(PoolState { entries, cursor: 0 }),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.state.lock().expect("pool mutex poisoned").entries.is_empty()
	}

	/// Hand out the next eligible proxy, round-robin from an internal
	/// cursor, scanning at most one full cycle. If every proxy has hit
	/// `MAX_FAILURES`, perform one global reset and retry once more before
	/// giving up (§4.B).
	pub fn acquire(&self) -> Result<ProxyHandle, ProxyError> {
		let mut state = self.state.lock().expect("pool mutex poisoned");
		if state.entries.is_empty() {
			return Err(ProxyError::Exhausted);
		}

		if let Some(handle) = try_acquire(&mut state) {
			return Ok(handle);
		}

		if state.entries.iter().all(|e| e.failures >= MAX_FAILURES) {
			log::warn!("all {} proxies exhausted, resetting pool", state.entries.len());
			for entry in state.entries.iter_mut() {
				entry.failures = 0;
				entry.active_connections = 0;
				entry.last_used_at = None;
			}
			if let Some(handle) = try_acquire(&mut state) {
				return Ok(handle);
			}
		}

		Err(ProxyError::Exhausted)
	}

	/// Record a successful dial: clears the failure counter but leaves
	/// `active_connections` untouched (the caller still owes a `release`).
	pub fn mark_success(&self, handle: &ProxyHandle) {
		let mut state = self.state.lock().expect("pool mutex poisoned");
		if let Some(entry) = state.entries.get_mut(handle.id) {
			entry.failures = 0;
		}
	}

	/// Record a failed dial: bumps the failure counter and releases the
	/// connection slot. Clears `last_used_at` — the cooldown throttles
	/// spacing between successful uses, not retries after a failure.
	pub fn mark_failure(&self, handle: &ProxyHandle) {
		let mut state = self.state.lock().expect("pool mutex poisoned");
		if let Some(entry) = state.entries.get_mut(handle.id) {
			entry.failures += 1;
			entry.active_connections = entry.active_connections.saturating_sub(1);
			entry.last_used_at = None;
		}
	}

	/// Release the connection slot without touching the failure counter.
	pub fn release(&self, handle: &ProxyHandle) {
		let mut state = self.state.lock().expect("pool mutex poisoned");
		if let Some(entry) = state.entries.get_mut(handle.id) {
			entry.active_connections = entry.active_connections.saturating_sub(1);
		}
	}

	#[cfg(test)]
	fn snapshot(&self) -> Vec<(u32, u32)> {
		self.state
			.lock()
			.expect("pool mutex poisoned")
			.entries
			.iter()
			.map(|e| (e.failures, e.active_connections))
			.collect()
	}
}

/// Scan at most one full cycle from `state.cursor`, returning the first
/// eligible entry and advancing the cursor past it.
fn try_acquire(state: &mut PoolState) -> Option<ProxyHandle> {
	let len = state.entries.len();
	let now = Utc::now();
	for step in 0..len {
		let idx = (state.cursor + step) % len;
		if state.entries[idx].eligible(now) {
			state.entries[idx].last_used_at = Some(now);
			state.entries[idx].active_connections += 1;
			state.cursor = (idx + 1) % len;
			let entry = &state.entries[idx];
			return Some(ProxyHandle {
				id: idx,
				host: entry.host.clone(),
				port: entry.port,
				user: entry.user.clone(),
				pass: entry.pass.clone(),
			});
		}
	}
	None
}

fn parse_proxy_line(line: &str) -> Option<ProxyEntry> {
	let mut parts = line.splitn(4, ':');
	let host = parts.next()?.to_string();
	if host.is_empty() {
		return None;
	}
	let port: u16 = parts.next()?.parse().ok()?;
	let user = parts.next().map(|s| s.to_string());
	let pass = parts.next().map(|s| s.to_string());

	Some(ProxyEntry {
		host,
		port,
		user,
		pass,
		failures: 0,
		active_connections: 0,
		last_used_at: None,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn three_proxy_pool() -> Pool {
		Pool::parse(
			"# comment\n\nproxy1.example.com:1080\nproxy2.example.com:1080:user:pass\nproxy3.example.com:1080\n",
		)
	}

	#[test]
	fn parses_and_skips_malformed_lines() {
		let pool = Pool::parse("good:1080\nmalformed-no-port\n# comment\n\ngood2:1080:u:p\n");
		assert_eq!(pool.state.lock().unwrap().entries.len(), 2);
	}

	#[test]
	fn empty_pool_is_legal_and_always_exhausted() {
		let pool = Pool::empty();
		assert!(pool.is_empty());
		assert!(matches!(pool.acquire(), Err(ProxyError::Exhausted)));
	}

	#[test]
	fn acquire_round_robins_and_caps_concurrency() {
		let pool = three_proxy_pool();
		let h1 = pool.acquire().expect("first acquire");
		let h2 = pool.acquire().expect("second acquire");
		let h3 = pool.acquire().expect("third acquire");
		assert_ne!(h1.host, h2.host);
		assert_ne!(h2.host, h3.host);
		pool.release(&h1);
		pool.release(&h2);
		pool.release(&h3);
	}

	#[test]
	fn invariant_active_connections_never_negative() {
		let pool = three_proxy_pool();
		let h1 = pool.acquire().unwrap();
		pool.release(&h1);
		// Releasing twice must never underflow.
		pool.release(&h1);
		for (failures, active) in pool.snapshot() {
			assert!(failures < u32::MAX);
			assert_eq!(active, 0);
		}
	}

	#[test]
	fn global_reset_after_all_proxies_fail() {
		let pool = Pool::parse("only-proxy.example.com:1080\n");
		for _ in 0..MAX_FAILURES {
			let h = pool.acquire().expect("acquire before exhaustion");
			pool.mark_failure(&h);
		}
		// The single proxy now has failures == MAX_FAILURES: the next
		// acquire must trigger a global reset and succeed, never hand back
		// an over-budget proxy.
		let h = pool.acquire().expect("acquire after reset");
		assert_eq!(pool.snapshot(), vec![(0, 1)]);
		pool.release(&h);
	}

	#[test]
	fn connection_cap_is_respected() {
		let pool = Pool::parse("only-proxy.example.com:1080\n");
		let mut handles = Vec::new();
		for _ in 0..MAX_CONNECTIONS {
			handles.push(pool.acquire().expect("should stay under cap"));
		}
		// The proxy is now at its connection cap; a cooldown-bypassing
		// acquire must fail since there is no second proxy to fall back to
		// and it hasn't failed MAX_FAILURES times.
		assert!(matches!(pool.acquire(), Err(ProxyError::Exhausted)));
		for h in handles {
			pool.release(&h);
		}
	}
}
