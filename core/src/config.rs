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

//! Runtime configuration (§3 ambient additions), read once from the
//! environment. There is no config file: every deployment surface (CLI,
//! HTTP adapter) shares this same struct.

use std::env;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_CORS_ORIGIN: &str = "*";

/// Process-wide settings, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
	/// Port the HTTP adapter listens on (`PORT`).
	pub listen_port: u16,
	/// `Access-Control-Allow-Origin` value the HTTP adapter sends (`CORS_ORIGIN`).
	pub cors_origin: String,
	/// Path to the proxy list (`PROXIES_FILE`); `None` means run proxy-less.
	pub proxies_file: Option<String>,
}

impl Config {
	/// Build a `Config` from the process environment. Missing variables fall
	/// back to sane defaults rather than erroring: this engine must still run
	/// standalone, with no proxies and no special CORS policy.
	pub fn from_env() -> Self {
		let listen_port = env::var("PORT")
			.ok()
			.and_then(|v| v.parse().ok())
			.unwrap_or(DEFAULT_PORT);
		let cors_origin = env::var("CORS_ORIGIN").unwrap_or_else(|_| DEFAULT_CORS_ORIGIN.to_string());
		let proxies_file = env::var("PROXIES_FILE").ok().filter(|v| !v.is_empty());

		Config { listen_port, cors_origin, proxies_file }
	}
}

impl Default for Config {
	fn default() -> Self {
		Config { listen_port: DEFAULT_PORT, cors_origin: DEFAULT_CORS_ORIGIN.to_string(), proxies_file: None }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_when_environment_is_unset() {
		let config = Config::default();
		assert_eq!(config.listen_port, DEFAULT_PORT);
		assert_eq!(config.cors_origin, "*");
		assert!(config.proxies_file.is_none());
	}
}
