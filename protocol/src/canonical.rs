//! # Canonical Serialization
//!
//! [`CanonicalBytes`] is the only byte sequence Tessera ever hashes or
//! encrypts for a record. Independent parties recompute digests from it, so
//! the encoding is fixed:
//!
//! 1. JSON, UTF-8, no whitespace between tokens, no trailing newline.
//! 2. Object keys sorted by byte order at every depth.
//! 3. Integers only. Floats are rejected.
//! 4. Strings use serde_json's minimal RFC 8259 escaping.
//! 5. Arrays keep their order.
//!
//! The key sort is done here rather than relying on `serde_json::Map`
//! ordering, which flips to insertion order if any crate in the build turns
//! on `preserve_order`.

use serde_json::Value;
use thiserror::Error;

use crate::record::DeliverableRecord;

/// Errors raised while canonicalizing a record.
#[derive(Debug, Error)]
pub enum CanonicalError {
    /// Input shape is wrong: missing field, wrong type, or a broken
    /// semantic rule. Not retryable; fix the input.
    #[error("malformed record: {0}")]
    Malformed(String),

    /// Bytes parsed as a record but are not its canonical encoding.
    #[error("bytes are not in canonical form")]
    NotCanonical,
}

/// Bytes produced exclusively by [`canonicalize`].
///
/// The inner vector is private: there is no way to wrap arbitrary bytes as
/// `CanonicalBytes`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Canonicalize a typed record.
///
/// Deterministic and pure: the same logical record yields the same bytes on
/// every call, in every process.
///
/// # Errors
///
/// [`CanonicalError::Malformed`] if the record fails
/// [`DeliverableRecord::validate`].
pub fn canonicalize(record: &DeliverableRecord) -> Result<CanonicalBytes, CanonicalError> {
    record.validate()?;
    let value =
        serde_json::to_value(record).map_err(|e| CanonicalError::Malformed(e.to_string()))?;
    Ok(CanonicalBytes(to_canonical_vec(&value)?))
}

/// Canonicalize an untyped JSON record, e.g. one read from disk.
///
/// Field insertion order in `value` is irrelevant.
pub fn canonicalize_json(value: &Value) -> Result<CanonicalBytes, CanonicalError> {
    let record = DeliverableRecord::from_json(value)?;
    canonicalize(&record)
}

/// Parse bytes as a record and check they are already canonical.
pub fn parse_canonical(bytes: &[u8]) -> Result<DeliverableRecord, CanonicalError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| CanonicalError::Malformed(e.to_string()))?;
    let record = DeliverableRecord::from_json(&value)?;
    if canonicalize(&record)?.as_bytes() != bytes {
        return Err(CanonicalError::NotCanonical);
    }
    Ok(record)
}

/// Encode any JSON value with the canonical rules. Used for records and for
/// the escrow ticket header that is bound into the wrapped key.
pub(crate) fn to_canonical_vec(value: &Value) -> Result<Vec<u8>, CanonicalError> {
    let mut out = Vec::with_capacity(256);
    write_value(value, &mut out)?;
    Ok(out)
}

fn write_value(value: &Value, out: &mut Vec<u8>) -> Result<(), CanonicalError> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                out.extend_from_slice(i.to_string().as_bytes());
            } else if let Some(u) = n.as_u64() {
                out.extend_from_slice(u.to_string().as_bytes());
            } else {
                return Err(CanonicalError::Malformed(format!(
                    "non-integer number {n} has no canonical form"
                )));
            }
        }
        Value::String(s) => write_string(s, out)?,
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(key, out)?;
                out.push(b':');
                write_value(item, out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

fn write_string(s: &str, out: &mut Vec<u8>) -> Result<(), CanonicalError> {
    serde_json::to_writer(&mut *out, s).map_err(|e| CanonicalError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DeliverableFile, Deliverables, JobRef};
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
                files: vec![DeliverableFile::from_contents("report.md", b"report.md contents")],
                notes: "demo".into(),
            },
        )
    }

    #[test]
    fn keys_are_sorted_and_compact() {
        let bytes = canonicalize(&sample()).unwrap();
        let text = std::str::from_utf8(bytes.as_bytes()).unwrap();
        assert_eq!(
            text,
            "{\"createdAt\":1700000000,\"deliverables\":{\"files\":[{\"contentHash\":\
             \"2e9710e7a059223d8cb4527d3755e82da181803721334ef1da2f33eae0803760\",\
             \"path\":\"report.md\"}],\"notes\":\"demo\"},\"job\":{\"id\":\"job-123\",\
             \"milestone\":0,\"summary\":\"demo\"},\"kind\":\"deliverable_bundle\"}"
        );
    }

    #[test]
    fn repeated_calls_are_identical() {
        let record = sample();
        assert_eq!(canonicalize(&record).unwrap(), canonicalize(&record).unwrap());
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let hash = sample().deliverables.files[0].content_hash.clone();
        let a = json!({
            "kind": "deliverable_bundle",
            "createdAt": 1_700_000_000,
            "job": { "id": "job-123", "milestone": 0, "summary": "demo" },
            "deliverables": { "files": [{ "path": "report.md", "contentHash": hash }], "notes": "demo" }
        });
        let b = json!({
            "deliverables": { "notes": "demo", "files": [{ "contentHash": hash, "path": "report.md" }] },
            "job": { "summary": "demo", "milestone": 0, "id": "job-123" },
            "createdAt": 1_700_000_000,
            "kind": "deliverable_bundle"
        });
        assert_eq!(canonicalize_json(&a).unwrap(), canonicalize_json(&b).unwrap());
        assert_eq!(canonicalize_json(&a).unwrap(), canonicalize(&sample()).unwrap());
    }

    #[test]
    fn different_records_differ() {
        let mut other = sample();
        other.job.milestone = 1;
        assert_ne!(canonicalize(&sample()).unwrap(), canonicalize(&other).unwrap());
    }

    #[test]
    fn file_order_is_significant() {
        let mut a = sample();
        a.deliverables
            .files
            .push(DeliverableFile::from_contents("patch.diff", b"diff"));
        let mut b = a.clone();
        b.deliverables.files.reverse();
        assert_ne!(canonicalize(&a).unwrap(), canonicalize(&b).unwrap());
    }

    #[test]
    fn escapes_strings_minimally() {
        let mut record = sample();
        record.deliverables.notes = "line\n\"quoted\" café".into();
        let bytes = canonicalize(&record).unwrap();
        let text = std::str::from_utf8(bytes.as_bytes()).unwrap();
        assert!(text.contains(r#""notes":"line\n\"quoted\" café""#));
    }

    #[test]
    fn floats_have_no_canonical_form() {
        let err = to_canonical_vec(&json!({ "x": 0.5 })).unwrap_err();
        assert!(matches!(err, CanonicalError::Malformed(_)));
    }

    #[test]
    fn malformed_record_is_rejected() {
        let mut record = sample();
        record.job.id.clear();
        assert!(matches!(canonicalize(&record), Err(CanonicalError::Malformed(_))));
    }

    #[test]
    fn parse_canonical_round_trips_and_rejects_pretty_json() {
        let bytes = canonicalize(&sample()).unwrap();
        assert_eq!(parse_canonical(bytes.as_bytes()).unwrap(), sample());

        let pretty = serde_json::to_vec_pretty(&sample()).unwrap();
        assert!(matches!(
            parse_canonical(&pretty),
            Err(CanonicalError::NotCanonical)
        ));
    }
}
