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

//! A thin `tide` adapter over the validation engine. Kept deliberately
//! small: no multipart upload parsing and no object storage integration,
//! both explicitly out of scope. `/validate/bulk` takes pre-decoded CSV
//! bytes in the request body, not a multipart form.
//!
//! `tide` runs on `async-std`, the same runtime the core engine already
//! depends on for its DNS resolver and SMTP dialog, so this adapter never
//! has to bridge across two async runtimes.

use std::sync::Arc;

use deliverable_core::dns::SystemResolver;
use deliverable_core::{csv_row, validate_many, validate_one, Config, Pool, Resolver, ValidationResult};
use serde::{Deserialize, Serialize};
use tide::{Body, Request, Response, StatusCode};

#[derive(Clone)]
struct State {
	pool: Arc<Pool>,
	resolver: Arc<dyn Resolver>,
}

#[derive(Debug, Deserialize)]
struct ValidateRequest {
	email: String,
}

#[derive(Debug, Deserialize)]
struct BatchRequest {
	emails: Vec<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
	status: &'static str,
}

/// Build the `tide` app: a DNS resolver and proxy pool are constructed once
/// and shared across every request via `tide`'s app state.
pub async fn build_app(config: &Config) -> std::io::Result<tide::Server<State>> {
	let pool = match &config.proxies_file {
		Some(path) => Arc::new(Pool::load(path)?),
		None => Arc::new(Pool::empty()),
	};
	let resolver: Arc<dyn Resolver> = Arc::new(SystemResolver::from_system_conf().await?);
	let state = State { pool, resolver };

	let mut app = tide::with_state(state);
	app.at("/health").get(health);
	app.at("/validate").post(validate_single);
	app.at("/validate/batch").post(validate_batch);
	app.at("/validate/bulk").post(validate_bulk);
	Ok(app)
}

/// Build and run the app on `config.listen_port` (§4.H).
pub async fn serve(config: Config) -> std::io::Result<()> {
	let port = config.listen_port;
	let app = build_app(&config).await?;
	app.listen(format!("0.0.0.0:{}", port)).await
}

async fn health(_req: Request<State>) -> tide::Result {
	Body::from_json(&HealthResponse { status: "healthy" }).map(Into::into)
}

async fn validate_single(mut req: Request<State>) -> tide::Result {
	let body: ValidateRequest = req.body_json().await?;
	let state = req.state();
	let result: ValidationResult = validate_one(&body.email, &state.pool, state.resolver.as_ref()).await;
	Body::from_json(&result).map(Into::into)
}

async fn validate_batch(mut req: Request<State>) -> tide::Result {
	let body: BatchRequest = req.body_json().await?;
	let state = req.state().clone();
	let results = validate_many(body.emails, state.pool, state.resolver).await;
	Body::from_json(&results).map(Into::into)
}

/// Bulk CSV validation. The request body is the raw CSV file contents
/// (`Content-Type: text/csv`), already decoded — no multipart parsing here.
async fn validate_bulk(mut req: Request<State>) -> tide::Result {
	let contents = req.body_string().await?;
	let (rows, email_col) = match csv_row::parse(&contents) {
		Ok(parsed) => parsed,
		Err(err) => {
			return Ok(Response::builder(StatusCode::BadRequest)
				.body(format!("could not parse CSV: {}", err))
				.build())
		}
	};
	let email_col = match email_col {
		Some(col) => col,
		None => {
			return Ok(Response::builder(StatusCode::BadRequest)
				.body("no recognisable email column in header")
				.build())
		}
	};

	let emails: Vec<String> = rows
		.iter()
		.map(|row| csv_row::email_value(row, email_col).unwrap_or_default().to_string())
		.collect();

	let state = req.state().clone();
	let results = validate_many(emails, state.pool, state.resolver).await;

	match csv_row::write_augmented(&rows, &results) {
		Ok(csv_text) => {
			let mut response = Response::new(StatusCode::Ok);
			response.set_content_type("text/csv");
			response.set_body(csv_text);
			Ok(response)
		}
		Err(err) => Ok(Response::builder(StatusCode::InternalServerError)
			.body(format!("could not write CSV: {}", err))
			.build()),
	}
}
