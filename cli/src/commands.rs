//! Subcommand implementations.
//!
//! Each command returns what it produced so `main` decides what to print
//! and tests can inspect the files without capturing stdout.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use tessera_protocol::anchor::{digest, ContentDigest, ProofRecord};
use tessera_protocol::canonical::canonicalize_json;
use tessera_protocol::crypto::{EncryptedEnvelope, NonceRegistry, SymmetricKey};
use tessera_protocol::record::{DeliverableFile, DeliverableRecord, Deliverables, JobRef};
use tessera_protocol::verify::{verify_against_proof, Verification};
use tessera_protocol::{seal_bundle_once, BundleSummary};

/// File name the `demo` command writes.
pub const SAMPLE_BUNDLE_FILE: &str = "encrypted-bundle.sample.json";

// ---------------------------------------------------------------------------
// demo
// ---------------------------------------------------------------------------

/// Result of the `demo` command.
#[derive(Debug)]
pub struct DemoOutput {
    pub summary_path: PathBuf,
    pub anchor: ContentDigest,
    pub decrypt_ok: bool,
}

/// Sample record: one report file, job `job-123`.
pub fn sample_record(created_at: i64) -> DeliverableRecord {
    DeliverableRecord::new_bundle(
        created_at,
        JobRef {
            id: "job-123".into(),
            milestone: 0,
            summary: "demo".into(),
        },
        Deliverables {
            files: vec![DeliverableFile::from_contents(
                "report.md",
                b"report.md contents",
            )],
            notes: "demo".into(),
        },
    )
}

/// Seal the sample record, self-verify, and write the key-free summary.
pub fn demo(out_dir: &Path) -> Result<DemoOutput> {
    let record = sample_record(chrono::Utc::now().timestamp());
    let bundle =
        seal_bundle_once(&NonceRegistry::new(), &record).context("failed to seal sample")?;
    let summary = BundleSummary::from_sealed(&bundle);

    ensure_dir(out_dir)?;
    let summary_path = out_dir.join(SAMPLE_BUNDLE_FILE);
    write_json(&summary_path, &summary)?;

    tracing::info!(
        path = %summary_path.display(),
        anchor = %summary.proof.ciphertext_hash,
        decrypt_ok = summary.decrypt_ok,
        "sample bundle written"
    );

    Ok(DemoOutput {
        summary_path,
        anchor: *summary.proof.anchor_hash(),
        decrypt_ok: summary.decrypt_ok,
    })
}

// ---------------------------------------------------------------------------
// seal
// ---------------------------------------------------------------------------

/// Paths written by the `seal` command.
#[derive(Debug)]
pub struct SealOutput {
    pub envelope_path: PathBuf,
    pub proof_path: PathBuf,
    pub key_path: PathBuf,
    pub anchor: ContentDigest,
}

/// Seal the record at `record_path` under a fresh key.
///
/// Writes `<stem>.envelope.json`, `<stem>.proof.json` and `<stem>.key`
/// into `out_dir`. The key file is the only place the key goes.
pub fn seal(record_path: &Path, out_dir: &Path) -> Result<SealOutput> {
    let value: Value = read_json(record_path)?;
    let record = DeliverableRecord::from_json(&value)
        .with_context(|| format!("invalid record in {}", record_path.display()))?;
    let bundle =
        seal_bundle_once(&NonceRegistry::new(), &record).context("failed to seal record")?;
    let (envelope, proof, key) = bundle.into_parts();

    let stem = record_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("record");

    ensure_dir(out_dir)?;
    let envelope_path = out_dir.join(format!("{stem}.envelope.json"));
    let proof_path = out_dir.join(format!("{stem}.proof.json"));
    let key_path = out_dir.join(format!("{stem}.key"));

    write_key(&key_path, &key)?;
    write_json(&envelope_path, &envelope)?;
    write_json(&proof_path, &proof)?;

    tracing::info!(
        job = %record.job.id,
        anchor = %proof.ciphertext_hash,
        out_dir = %out_dir.display(),
        "record sealed"
    );

    Ok(SealOutput {
        envelope_path,
        proof_path,
        key_path,
        anchor: *proof.anchor_hash(),
    })
}

// ---------------------------------------------------------------------------
// verify
// ---------------------------------------------------------------------------

/// Check an envelope against its proof. Fails unless the content verifies.
pub fn verify(envelope_path: &Path, proof_path: &Path, key_path: &Path) -> Result<DeliverableRecord> {
    let envelope: EncryptedEnvelope = read_json(envelope_path)?;
    let proof: ProofRecord = read_json(proof_path)?;
    let key = read_key(key_path)?;

    match verify_against_proof(&envelope, &key, &proof) {
        outcome @ Verification::Verified { .. } => {
            let record = outcome
                .into_record()
                .context("verified content is not a canonical record")?
                .context("verification outcome carried no content")?;
            tracing::info!(job = %record.job.id, anchor = %proof.ciphertext_hash, "delivery verified");
            Ok(record)
        }
        Verification::Failed(reason) => {
            tracing::warn!(%reason, anchor = %proof.ciphertext_hash, "delivery rejected");
            bail!("verification failed: {reason}")
        }
    }
}

// ---------------------------------------------------------------------------
// digest
// ---------------------------------------------------------------------------

/// SHA-256 hex of the canonical form of the record at `path`.
pub fn digest_file(path: &Path) -> Result<String> {
    let value: Value = read_json(path)?;
    let canonical = canonicalize_json(&value)
        .with_context(|| format!("invalid record in {}", path.display()))?;
    Ok(digest(canonical.as_bytes()))
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory: {}", dir.display()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut body = serde_json::to_vec_pretty(value)?;
    body.push(b'\n');
    fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))
}

/// Write the base64 key to a new file. On unix the file is created with
/// mode 0600, so it is never readable by others. Existing files are not
/// overwritten.
fn write_key(path: &Path, key: &SymmetricKey) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .with_context(|| format!("failed to create key file {}", path.display()))?;
    let encoded = key.to_base64();
    file.write_all(encoded.as_bytes())
        .with_context(|| format!("failed to write key to {}", path.display()))
}

fn read_key(path: &Path) -> Result<SymmetricKey> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read key from {}", path.display()))?;
    SymmetricKey::from_base64(&raw).with_context(|| format!("invalid key in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_record(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        // Keys deliberately out of canonical order.
        let json = serde_json::json!({
            "kind": "deliverable_bundle",
            "job": { "summary": "audit", "milestone": 2, "id": "job-7" },
            "deliverables": {
                "notes": "final",
                "files": [{ "path": "a.txt", "contentHash": digest(b"a") }]
            },
            "createdAt": 1_700_000_000
        });
        fs::write(&path, serde_json::to_vec(&json).unwrap()).unwrap();
        path
    }

    #[test]
    fn demo_writes_summary_without_key() {
        let dir = tempdir().unwrap();
        let out = demo(dir.path()).unwrap();
        assert!(out.decrypt_ok);
        assert_eq!(out.summary_path, dir.path().join(SAMPLE_BUNDLE_FILE));

        let summary: BundleSummary = read_json(&out.summary_path).unwrap();
        assert_eq!(summary.proof.ciphertext_hash, out.anchor);
        let raw: Value = read_json(&out.summary_path).unwrap();
        let mut fields: Vec<_> = raw.as_object().unwrap().keys().cloned().collect();
        fields.sort();
        assert_eq!(fields, ["decryptOk", "envelope", "note", "proof"]);
    }

    #[test]
    fn seal_then_verify_round_trip() {
        let dir = tempdir().unwrap();
        let record_path = write_record(dir.path(), "milestone.json");
        let out_dir = dir.path().join("out");

        let sealed = seal(&record_path, &out_dir).unwrap();
        assert!(sealed.key_path.ends_with("milestone.key"));

        let envelope = fs::read_to_string(&sealed.envelope_path).unwrap();
        let key = fs::read_to_string(&sealed.key_path).unwrap();
        assert!(!envelope.contains(key.trim()));

        let record = verify(&sealed.envelope_path, &sealed.proof_path, &sealed.key_path).unwrap();
        assert_eq!(record.job.id, "job-7");
        assert_eq!(record.job.milestone, 2);
    }

    #[test]
    fn verify_with_wrong_key_fails() {
        let dir = tempdir().unwrap();
        let record_path = write_record(dir.path(), "r.json");
        let sealed = seal(&record_path, dir.path()).unwrap();

        let other_key = dir.path().join("other.key");
        write_key(&other_key, &SymmetricKey::generate()).unwrap();

        let err = verify(&sealed.envelope_path, &sealed.proof_path, &other_key).unwrap_err();
        assert!(err.to_string().contains("verification failed"));
    }

    #[test]
    fn verify_with_foreign_proof_fails() {
        let dir = tempdir().unwrap();
        let first = seal(&write_record(dir.path(), "one.json"), dir.path()).unwrap();
        let second = seal(&write_record(dir.path(), "two.json"), dir.path()).unwrap();

        assert!(verify(&first.envelope_path, &second.proof_path, &first.key_path).is_err());
    }

    #[test]
    fn digest_ignores_field_order() {
        let dir = tempdir().unwrap();
        let path = write_record(dir.path(), "r.json");
        let value: Value = read_json(&path).unwrap();
        let record = DeliverableRecord::from_json(&value).unwrap();
        let expected = digest(
            tessera_protocol::canonicalize(&record)
                .unwrap()
                .as_bytes(),
        );
        assert_eq!(digest_file(&path).unwrap(), expected);
    }

    #[test]
    fn digest_rejects_malformed_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, br#"{"kind":"deliverable_bundle","createdAt":1.5}"#).unwrap();
        assert!(digest_file(&path).is_err());
    }

    #[test]
    fn existing_key_file_is_not_overwritten() {
        let dir = tempdir().unwrap();
        let record_path = write_record(dir.path(), "r.json");
        let first = seal(&record_path, dir.path()).unwrap();
        let original = fs::read_to_string(&first.key_path).unwrap();
        let envelope = fs::read_to_string(&first.envelope_path).unwrap();

        assert!(seal(&record_path, dir.path()).is_err());
        assert_eq!(fs::read_to_string(&first.key_path).unwrap(), original);
        assert_eq!(fs::read_to_string(&first.envelope_path).unwrap(), envelope);
        verify(&first.envelope_path, &first.proof_path, &first.key_path).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let sealed = seal(&write_record(dir.path(), "r.json"), dir.path()).unwrap();
        let mode = fs::metadata(&sealed.key_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
