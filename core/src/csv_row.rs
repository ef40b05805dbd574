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

//! CSV bulk input/output (§4.G): detect the email column in an uploaded
//! file, then append validation columns to each row without disturbing the
//! columns that were already there.

use csv::{Reader, StringRecord, Writer};

use crate::result::ValidationResult;

/// Column names (case-insensitively) that are taken to hold the address.
const EMAIL_COLUMN_CANDIDATES: &[&str] = &["email", "email address", "address", "mail"];

/// One input row: `(header, value)` pairs, in file order.
pub type CsvRow = Vec<(String, String)>;

/// Parse `contents` as CSV with headers, returning each row alongside the
/// column index holding the email address.
///
/// Returns `None` for the index if no header looks like an email column;
/// callers should then treat the whole file as malformed rather than guess.
pub fn parse(contents: &str) -> csv::Result<(Vec<CsvRow>, Option<usize>)> {
	let mut reader = Reader::from_reader(contents.as_bytes());
	let headers = reader.headers()?.clone();
	let email_col = detect_email_column(&headers);

	let mut rows = Vec::new();
	for record in reader.records() {
		let record = record?;
		rows.push(zip_row(&headers, &record));
	}
	Ok((rows, email_col))
}

fn detect_email_column(headers: &StringRecord) -> Option<usize> {
	headers.iter().position(|h| EMAIL_COLUMN_CANDIDATES.contains(&h.trim().to_lowercase().as_str()))
}

fn zip_row(headers: &StringRecord, record: &StringRecord) -> CsvRow {
	headers.iter().zip(record.iter()).map(|(h, v)| (h.to_string(), v.to_string())).collect()
}

/// Read the value at `email_col` out of `row`.
pub fn email_value(row: &CsvRow, email_col: usize) -> Option<&str> {
	row.get(email_col).map(|(_, v)| v.as_str())
}

/// Append validation result columns to `rows` and serialise back to CSV
/// text. Original columns and their order are preserved; the new columns
/// are appended at the end, in a fixed order, for every row (§4.G, §6).
///
/// Commas inside `validation_reason` are replaced with semicolons so they
/// never get mistaken for a field separator by a naive downstream CSV
/// consumer.
pub fn write_augmented(rows: &[CsvRow], results: &[ValidationResult]) -> csv::Result<String> {
	let mut writer = Writer::from_writer(Vec::new());

	if let Some(first) = rows.first() {
		let mut header: Vec<&str> = first.iter().map(|(h, _)| h.as_str()).collect();
		header.extend([
			"validation_result",
			"validation_reason",
			"mx_check",
			"dns_check",
			"spf_check",
			"mailbox_check",
			"smtp_check",
			"catch_all",
		]);
		writer.write_record(&header)?;
	}

	for (row, result) in rows.iter().zip(results.iter()) {
		let mut record: Vec<String> = row.iter().map(|(_, v)| v.clone()).collect();
		record.push(if result.valid { "Valid".to_string() } else { "Invalid".to_string() });
		record.push(result.reason.replace(',', ";"));
		record.push(bool_str(result.checks.mx));
		record.push(bool_str(result.checks.dns));
		record.push(bool_str(result.checks.spf));
		record.push(bool_str(result.checks.mailbox));
		record.push(bool_str(result.checks.smtp));
		record.push(bool_str(result.checks.catch_all));
		writer.write_record(&record)?;
	}

	let bytes = writer.into_inner().map_err(|e| e.into_error())?;
	Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn bool_str(value: bool) -> String {
	value.to_string()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::result::Checks;

	#[test]
	fn detects_email_column_case_insensitively() {
		let (rows, email_col) = parse("Name,Email\nAlice,alice@example.com\n").unwrap();
		assert_eq!(email_col, Some(1));
		assert_eq!(email_value(&rows[0], 1), Some("alice@example.com"));
	}

	#[test]
	fn no_recognisable_email_column_yields_none() {
		let (_, email_col) = parse("Name,City\nAlice,Paris\n").unwrap();
		assert_eq!(email_col, None);
	}

	#[test]
	fn augmented_output_preserves_original_columns_and_appends_new_ones() {
		let (rows, _) = parse("name,email\nAlice,alice@example.com\n").unwrap();
		let result = ValidationResult::failed("alice@example.com", "Domain does not exist", Checks::default());
		let csv_text = write_augmented(&rows, &[result]).unwrap();

		let mut lines = csv_text.lines();
		let header = lines.next().unwrap();
		assert!(header.starts_with("name,email,"));
		assert!(header.contains("validation_result"));
		assert!(header.contains("catch_all"));

		let data = lines.next().unwrap();
		assert!(data.starts_with("Alice,alice@example.com,Invalid,Domain does not exist,"));
	}

	#[test]
	fn commas_in_reason_become_semicolons() {
		let (rows, _) = parse("email\nalice@example.com\n").unwrap();
		let result = ValidationResult::failed(
			"alice@example.com",
			"Failed to verify mailbox: a, b, c",
			Checks::default(),
		);
		let csv_text = write_augmented(&rows, &[result]).unwrap();
		assert!(!csv_text.lines().nth(1).unwrap().contains("a, b, c"));
		assert!(csv_text.contains("a; b; c"));
	}
}
