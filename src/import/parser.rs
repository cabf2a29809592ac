//! CSV parsing for user imports.
//!
//! The header must start with [`REQUIRED_COLUMNS`] (case-insensitive, extra
//! trailing columns allowed). A bad header is fatal; bad data rows are logged
//! and skipped so one malformed line never aborts the batch.

use super::config::REQUIRED_COLUMNS;
use super::error::{ImportError, ImportResult};
use super::record::ImportRecord;
use csv::{ErrorKind, ReaderBuilder, StringRecord, Trim};
use std::collections::HashSet;
use std::io::Read;

/// Parse `reader` into records, stopping after `max_records` accepted rows
/// (`0` = unlimited). Line numbers are 1-based with the header on line 1.
///
/// With `skip_duplicates`, a row repeating an email or username accepted
/// earlier (case-insensitive) is dropped and does not count toward the cap.
pub fn parse_records<R: Read>(
    reader: R,
    max_records: usize,
    skip_duplicates: bool,
) -> ImportResult<Vec<ImportRecord>> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);
    let mut rows = csv_reader.records();

    let header = match rows.next() {
        None => return Err(ImportError::MissingHeader),
        Some(Err(e)) => return Err(ImportError::Read(e)),
        Some(Ok(header)) => header,
    };
    validate_header(&header)?;

    let mut records = Vec::new();
    let mut seen = skip_duplicates.then(SeenUsers::default);
    let mut line_num = 2;

    loop {
        if max_records > 0 && records.len() >= max_records {
            log::warn!("reached maximum record limit of {}", max_records);
            break;
        }

        let row = match rows.next() {
            None => break,
            Some(Ok(row)) => row,
            Some(Err(e)) => {
                if matches!(e.kind(), ErrorKind::Io(_)) {
                    return Err(ImportError::Read(e));
                }
                log::error!("error reading CSV row at line {}: {}", line_num, e);
                line_num += 1;
                continue;
            }
        };

        if let Some(record) = row_to_record(&row, line_num) {
            if seen.as_mut().is_none_or(|seen| seen.admit(&record)) {
                records.push(record);
            }
        }
        line_num += 1;
    }

    Ok(records)
}

fn validate_header(header: &StringRecord) -> ImportResult<()> {
    let matches = header.len() >= REQUIRED_COLUMNS.len()
        && REQUIRED_COLUMNS
            .iter()
            .zip(header.iter())
            .all(|(expected, actual)| actual.trim().to_lowercase() == *expected);

    if matches {
        Ok(())
    } else {
        Err(ImportError::HeaderMismatch {
            expected: REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            found: header.iter().map(|c| c.to_string()).collect(),
        })
    }
}

fn row_to_record(row: &StringRecord, line_num: usize) -> Option<ImportRecord> {
    if row.len() < REQUIRED_COLUMNS.len() {
        log::warn!(
            "skipping incomplete row at line {} ({} columns)",
            line_num,
            row.len()
        );
        return None;
    }

    let field = |idx: usize| row.get(idx).unwrap_or_default().trim().to_string();
    let record = ImportRecord {
        username: field(0),
        email: field(1),
        password: field(2),
        role: field(3),
        line_num,
    };

    // An empty role is left to the worker, which reports it as an invalid role.
    if record.username.is_empty() || record.email.is_empty() || record.password.is_empty() {
        log::warn!("skipping row with empty required fields at line {}", line_num);
        return None;
    }

    Some(record)
}

/// Emails and usernames accepted so far, lowercased.
#[derive(Default)]
struct SeenUsers {
    emails: HashSet<String>,
    usernames: HashSet<String>,
}

impl SeenUsers {
    /// Record `record` as seen, or return `false` if it repeats an earlier one.
    /// The first occurrence wins.
    fn admit(&mut self, record: &ImportRecord) -> bool {
        let email = record.email.to_lowercase();
        let username = record.username.to_lowercase();
        if self.emails.contains(&email) || self.usernames.contains(&username) {
            log::warn!(
                "skipping duplicate user '{}' <{}> at line {}",
                record.username,
                record.email,
                record.line_num
            );
            return false;
        }
        self.emails.insert(email);
        self.usernames.insert(username);
        true
    }
}
