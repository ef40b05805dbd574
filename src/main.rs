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

//! `deliverable check <email>` runs one address through the validation
//! engine and prints the result as JSON. `deliverable serve` starts the
//! HTTP adapter.

use clap::{App, Arg, SubCommand};
use deliverable_core::dns::SystemResolver;
use deliverable_core::{validate_one, Config, Pool};

fn main() {
	env_logger::init();

	let matches = App::new("deliverable")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Probe an email address for deliverability without sending any mail.")
		.subcommand(
			SubCommand::with_name("check")
				.about("Validate a single email address")
				.arg(Arg::with_name("email").required(true).index(1))
				.arg(
					Arg::with_name("proxies")
						.long("proxies")
						.takes_value(true)
						.help("path to a newline-separated list of SOCKS5 proxies"),
				),
		)
		.subcommand(
			SubCommand::with_name("serve")
				.about("Run the HTTP adapter")
				.arg(Arg::with_name("port").long("port").takes_value(true)),
		)
		.get_matches();

	match matches.subcommand() {
		("check", Some(sub_matches)) => {
			let email = sub_matches.value_of("email").expect("email is required").to_string();
			let proxies_file = sub_matches.value_of("proxies").map(str::to_string);
			let mut config = Config::from_env();
			if proxies_file.is_some() {
				config.proxies_file = proxies_file;
			}
			async_std::task::block_on(run_check(email, config));
		}
		("serve", Some(sub_matches)) => {
			let mut config = Config::from_env();
			if let Some(port) = sub_matches.value_of("port").and_then(|p| p.parse().ok()) {
				config.listen_port = port;
			}
			if let Err(err) = async_std::task::block_on(deliverable_http::serve(config)) {
				log::error!("server exited with an error: {}", err);
				std::process::exit(1);
			}
		}
		_ => {
			println!("{}", matches.usage());
		}
	}
}

async fn run_check(email: String, config: Config) {
	let pool = match &config.proxies_file {
		Some(path) => match Pool::load(path) {
			Ok(pool) => pool,
			Err(err) => {
				log::error!("could not load proxies file {:?}: {}", path, err);
				std::process::exit(1);
			}
		},
		None => Pool::empty(),
	};

	let resolver = match SystemResolver::from_system_conf().await {
		Ok(resolver) => resolver,
		Err(err) => {
			log::error!("could not set up the DNS resolver: {}", err);
			std::process::exit(1);
		}
	};

	let result = validate_one(&email, &pool, &resolver).await;
	match serde_json::to_string_pretty(&result) {
		Ok(json) => println!("{}", json),
		Err(err) => log::error!("could not serialise result: {}", err),
	}

	if !result.valid {
		std::process::exit(2);
	}
}
