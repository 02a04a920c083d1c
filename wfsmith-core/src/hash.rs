// Structural fingerprints over task types.
//
// All hashes are SHA-256 digests of canonical string encodings. The two
// construction rules everything else builds on:
//   type_hash(type, parent_hashes)  — digest of the type plus the sorted,
//                                     deduplicated parent fingerprints.
//   combine_hashes(h1, h2, ...)     — digest of the sorted inputs, so the
//                                     combination is order-independent.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A fixed-width structural fingerprint (lowercase hex SHA-256).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log output.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Digest an arbitrary canonical string.
pub fn string_hash(input: &str) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    Fingerprint(hex)
}

/// Fingerprint of a task type given the fingerprints of its neighbors in
/// one traversal direction. Parent order and multiplicity are irrelevant.
pub fn type_hash<'a, I>(task_type: &str, parent_hashes: I) -> Fingerprint
where
    I: IntoIterator<Item = &'a Fingerprint>,
{
    let unique: BTreeSet<&Fingerprint> = parent_hashes.into_iter().collect();
    let mut canonical = String::from(task_type);
    for hash in unique {
        canonical.push(':');
        canonical.push_str(hash.as_str());
    }
    string_hash(&canonical)
}

/// Order-independent combination of fingerprints.
pub fn combine_hashes<'a, I>(hashes: I) -> Fingerprint
where
    I: IntoIterator<Item = &'a Fingerprint>,
{
    let mut sorted: Vec<&Fingerprint> = hashes.into_iter().collect();
    sorted.sort();
    let mut canonical = String::new();
    for hash in sorted {
        canonical.push(':');
        canonical.push_str(hash.as_str());
    }
    string_hash(&canonical)
}

// ── Tests ─────────────────────────────────────────────────────────────
