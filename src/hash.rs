//! Content fingerprinting for deduplication.

use sha2::{Digest, Sha256};

/// SHA-256 fingerprint of a document's content and source URL, hex-encoded.
///
/// The two inputs are concatenated with no separator, so the pair
/// `("ab", "c")` hashes identically to `("a", "bc")`. The fingerprint is
/// stable across releases; ingested documents are keyed on it.
pub fn fingerprint(content: &str, source_url: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    if let Some(url) = source_url {
        hasher.update(url.as_bytes());
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
