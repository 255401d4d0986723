//! Decoding of search job result envelopes.
//!
//! Splunk returns `{"results": [...], "fields": [...], "messages": [...]}`
//! for a oneshot search. Rows are loosely typed: most values are strings,
//! some come back as numbers, multi-value fields come back as arrays. The
//! decoder turns each row into a flat [`Record`] and skips the rows it
//! cannot trust, without failing the batch.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::DecodeError;

/// One decoded result row: field name → string value.
pub type Record = BTreeMap<String, String>;

/// Raw search result envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(default)]
    pub fields: Vec<SearchField>,
    #[serde(default)]
    pub preview: bool,
    #[serde(default)]
    pub init_offset: u64,
    #[serde(default)]
    pub messages: Vec<SearchMessage>,
}

/// Field descriptor in a result envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchField {
    pub name: String,
}

/// Diagnostic message attached to a search result.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchMessage {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

impl SearchMessage {
    fn is_error(&self) -> bool {
        matches!(self.kind.as_str(), "ERROR" | "FATAL")
    }
}

/// Rows that survived decoding, plus what it cost to get them.
#[derive(Debug, Clone, Default)]
pub struct DecodedBatch {
    pub records: Vec<Record>,
    /// Number of rows dropped as malformed or incomplete.
    pub skipped: usize,
    /// `false` if any row was dropped or the search reported an error.
    pub complete: bool,
}

/// Decode a raw envelope, requiring every field in `required` on each row.
pub fn decode_results(raw: &str, required: &[&str]) -> Result<DecodedBatch, DecodeError> {
    let envelope: SearchResults = serde_json::from_str(raw)?;
    Ok(decode_envelope(envelope, required))
}

/// Decode an already-parsed envelope. Never fails as a whole.
pub fn decode_envelope(envelope: SearchResults, required: &[&str]) -> DecodedBatch {
    let mut batch = DecodedBatch {
        records: Vec::with_capacity(envelope.results.len()),
        skipped: 0,
        complete: true,
    };

    for msg in envelope.messages.iter().filter(|m| m.is_error()) {
        tracing::error!(kind = %msg.kind, text = %msg.text, "search reported an error");
        batch.complete = false;
    }

    for (index, row) in envelope.results.into_iter().enumerate() {
        match decode_row(index, row, required) {
            Ok(record) => batch.records.push(record),
            Err(e) => {
                tracing::warn!(row = index, error = %e, "skipping search result row");
                batch.skipped += 1;
                batch.complete = false;
            }
        }
    }

    tracing::debug!(
        rows = batch.records.len(),
        skipped = batch.skipped,
        "decoded search results"
    );
    batch
}

fn decode_row(index: usize, row: Value, required: &[&str]) -> Result<Record, DecodeError> {
    let Value::Object(fields) = row else {
        return Err(DecodeError::MalformedRow {
            index,
            reason: "row is not an object".into(),
        });
    };

    let mut record = Record::new();
    for (name, value) in fields {
        let text = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => continue,
            Value::Array(_) | Value::Object(_) => {
                return Err(DecodeError::MalformedRow {
                    index,
                    reason: format!("field \"{name}\" is not a scalar"),
                });
            }
        };
        record.insert(name, text);
    }

    if let Some(missing) = required.iter().find(|f| !record.contains_key(**f)) {
        return Err(DecodeError::MissingField {
            index,
            field: (*missing).to_string(),
        });
    }
    Ok(record)
}
