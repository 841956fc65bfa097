//! # Deliverable Records
//!
//! The logical structure a seller hands over at a milestone: which job, what
//! was delivered (paths plus content hashes), and free-text notes. Records are
//! plain values. Two records are the same record iff every field is equal,
//! and [`crate::canonical::canonicalize`] maps them to the same bytes.
//!
//! Wire field names are camelCase:
//!
//! ```text
//! { "kind", "createdAt",
//!   "job": { "id", "milestone", "summary" },
//!   "deliverables": { "files": [ { "path", "contentHash" } ], "notes" } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::CanonicalError;
use crate::config::{CONTENT_HASH_HEX_LENGTH, DEFAULT_RECORD_KIND};
use crate::crypto::hash::sha256_hex;

/// A deliverable bundle record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeliverableRecord {
    /// Record type tag, normally `"deliverable_bundle"`.
    pub kind: String,
    /// Unix timestamp (seconds) when the bundle was assembled.
    pub created_at: i64,
    /// The job and milestone this delivery belongs to.
    pub job: JobRef,
    /// What was delivered.
    pub deliverables: Deliverables,
}

/// Reference to the job a delivery fulfils.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobRef {
    /// Job identifier, e.g. `"job-123"`.
    pub id: String,
    /// Zero-based milestone index.
    pub milestone: u32,
    /// Short human-readable description of the work.
    pub summary: String,
}

/// The delivered artefacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Deliverables {
    /// Delivered files, in the order the seller listed them.
    pub files: Vec<DeliverableFile>,
    /// Free-text notes. May be empty.
    pub notes: String,
}

/// One delivered file, identified by path and SHA-256 of its contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeliverableFile {
    pub path: String,
    /// Lowercase hex SHA-256 of the file contents, computed off-chain.
    pub content_hash: String,
}

impl DeliverableRecord {
    /// Builds a record with the default `"deliverable_bundle"` kind.
    pub fn new_bundle(created_at: i64, job: JobRef, deliverables: Deliverables) -> Self {
        Self {
            kind: DEFAULT_RECORD_KIND.to_string(),
            created_at,
            job,
            deliverables,
        }
    }

    /// Parses and validates a record from an untyped JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError::Malformed`] if a field is missing, has the
    /// wrong JSON type (e.g. a fractional or string `createdAt`), an unknown
    /// field is present, or a semantic rule fails (see [`Self::validate`]).
    pub fn from_json(value: &Value) -> Result<Self, CanonicalError> {
        let record: Self = serde_json::from_value(value.clone())
            .map_err(|e| CanonicalError::Malformed(e.to_string()))?;
        record.validate()?;
        Ok(record)
    }

    /// Checks the semantic rules serde cannot express.
    ///
    /// - `kind` and `job.id` are non-empty.
    /// - every file has a non-empty `path`.
    /// - every `contentHash` is exactly 64 lowercase hex characters.
    ///
    /// Uppercase hex is rejected rather than normalized: normalizing would
    /// map two field-wise different records to the same canonical bytes.
    pub fn validate(&self) -> Result<(), CanonicalError> {
        if self.kind.is_empty() {
            return Err(CanonicalError::Malformed("kind must not be empty".into()));
        }
        if self.job.id.is_empty() {
            return Err(CanonicalError::Malformed("job.id must not be empty".into()));
        }
        for (i, file) in self.deliverables.files.iter().enumerate() {
            if file.path.is_empty() {
                return Err(CanonicalError::Malformed(format!(
                    "deliverables.files[{i}].path must not be empty"
                )));
            }
            if !is_lower_hex_digest(&file.content_hash) {
                return Err(CanonicalError::Malformed(format!(
                    "deliverables.files[{i}].contentHash must be {CONTENT_HASH_HEX_LENGTH} lowercase hex characters"
                )));
            }
        }
        Ok(())
    }
}

impl DeliverableFile {
    pub fn new(path: impl Into<String>, content_hash: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content_hash: content_hash.into(),
        }
    }

    /// Hashes `contents` and records it under `path`.
    pub fn from_contents(path: impl Into<String>, contents: &[u8]) -> Self {
        Self {
            path: path.into(),
            content_hash: sha256_hex(contents),
        }
    }
}

fn is_lower_hex_digest(s: &str) -> bool {
    s.len() == CONTENT_HASH_HEX_LENGTH
        && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> DeliverableRecord {
        DeliverableRecord::new_bundle(
            1_700_000_000,
            JobRef {
                id: "job-123".into(),
                milestone: 0,
                summary: "demo".into(),
            },
            Deliverables {
                files: vec![DeliverableFile::from_contents("report.md", b"# Report")],
                notes: "demo".into(),
            },
        )
    }

    #[test]
    fn new_bundle_uses_default_kind() {
        assert_eq!(sample().kind, "deliverable_bundle");
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let value = serde_json::to_value(sample()).unwrap();
        assert!(value.get("createdAt").is_some());
        assert!(value["deliverables"]["files"][0].get("contentHash").is_some());
    }

    #[test]
    fn from_json_rejects_string_timestamp() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["createdAt"] = json!("1700000000");
        assert!(matches!(
            DeliverableRecord::from_json(&value),
            Err(CanonicalError::Malformed(_))
        ));
    }

    #[test]
    fn from_json_rejects_fractional_timestamp() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["createdAt"] = json!(1.5);
        assert!(DeliverableRecord::from_json(&value).is_err());
    }

    #[test]
    fn from_json_rejects_missing_job() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value.as_object_mut().unwrap().remove("job");
        assert!(DeliverableRecord::from_json(&value).is_err());
    }

    #[test]
    fn from_json_rejects_unknown_field() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["ts"] = json!(1_700_000_000);
        assert!(DeliverableRecord::from_json(&value).is_err());
    }

    #[test]
    fn from_json_rejects_negative_milestone() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["job"]["milestone"] = json!(-1);
        assert!(DeliverableRecord::from_json(&value).is_err());
    }

    #[test]
    fn validate_rejects_placeholder_hash() {
        let mut record = sample();
        record.deliverables.files[0].content_hash = "<computed-offchain>".into();
        assert!(record.validate().is_err());
    }

    #[test]
    fn validate_rejects_uppercase_hash() {
        let mut record = sample();
        let upper = record.deliverables.files[0].content_hash.to_uppercase();
        record.deliverables.files[0].content_hash = upper;
        assert!(record.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_path_and_kind() {
        let mut record = sample();
        record.deliverables.files[0].path.clear();
        assert!(record.validate().is_err());

        let mut record = sample();
        record.kind.clear();
        assert!(record.validate().is_err());
    }

    #[test]
    fn empty_file_list_is_allowed() {
        let mut record = sample();
        record.deliverables.files.clear();
        assert!(record.validate().is_ok());
    }
}
