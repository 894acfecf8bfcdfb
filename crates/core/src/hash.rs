//! Content hashing and locality-sensitive similarity hashing (§4.0,
//! §4.2). `content_hash` feeds the dedup store's primary index;
//! `similarity_hash` feeds its near-duplicate secondary index, the
//! batcher's centroid comparison, and the threading manager's
//! content-similarity strategy.

use sha2::{Digest, Sha256};

/// Fields that are ordering-only or instance-specific and must be
/// stripped before hashing so that two deliveries of the same
/// semantic content produce the same `content_hash` (§3 invariant).
const NON_SEMANTIC_FIELDS: &[&str] = &[
    "timestamp",
    "delivery_id",
    "webhook_id",
    "sequence",
    "received_at",
    "updated_at",
];

/// Strong cryptographic hash over a payload's semantic fields, sorted
/// by key so field order never affects the hash.
pub fn content_hash(fields: &serde_json::Map<String, serde_json::Value>) -> String {
    let mut keys: Vec<&String> = fields
        .keys()
        .filter(|k| !NON_SEMANTIC_FIELDS.contains(&k.as_str()))
        .collect();
    keys.sort();

    let mut hasher = Sha256::new();
    for key in keys {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(fields[key].to_string().as_bytes());
        hasher.update(b";");
    }
    format!("{:x}", hasher.finalize())
}

/// A deterministic content hash that ignores all instance data beyond
/// the triple that identifies a self-reassignment, so repeated
/// self-reassignments on the same subject always collide in the
/// dedup store rather than being treated as new touches (§11 Open
/// Question resolution #1).
pub fn self_reassignment_hash(source: &str, subject_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"self-reassignment;");
    hasher.update(source.as_bytes());
    hasher.update(b";");
    hasher.update(subject_key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// 64-bit SimHash over a bag of text fields. Each token contributes
/// its hash's bits, weighted by occurrence count; the result bit is
/// the sign of the accumulated weight per bit position. Hamming
/// distance between two simhashes approximates content similarity.
pub fn similarity_hash(text_fields: &[&str]) -> u64 {
    let mut weights = [0i64; 64];

    for field in text_fields {
        for token in tokenize(field) {
            let token_hash = token_hash64(&token);
            for bit in 0..64 {
                if (token_hash >> bit) & 1 == 1 {
                    weights[bit] += 1;
                } else {
                    weights[bit] -= 1;
                }
            }
        }
    }

    let mut result: u64 = 0;
    for (bit, weight) in weights.iter().enumerate() {
        if *weight > 0 {
            result |= 1 << bit;
        }
    }
    result
}

pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn token_hash64(token: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[0..8]);
    u64::from_be_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_hash_ignores_field_order() {
        let mut a = serde_json::Map::new();
        a.insert("title".into(), json!("fix bug"));
        a.insert("state".into(), json!("open"));

        let mut b = serde_json::Map::new();
        b.insert("state".into(), json!("open"));
        b.insert("title".into(), json!("fix bug"));

        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn content_hash_ignores_non_semantic_fields() {
        let mut a = serde_json::Map::new();
        a.insert("title".into(), json!("fix bug"));
        a.insert("timestamp".into(), json!(1_700_000_000));

        let mut b = serde_json::Map::new();
        b.insert("title".into(), json!("fix bug"));
        b.insert("timestamp".into(), json!(1_800_000_000));

        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn content_hash_differs_on_semantic_change() {
        let mut a = serde_json::Map::new();
        a.insert("title".into(), json!("fix bug"));
        let mut b = serde_json::Map::new();
        b.insert("title".into(), json!("fix other bug"));
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn similarity_hash_identical_text_is_identical() {
        let h1 = similarity_hash(&["Deploy failed on staging"]);
        let h2 = similarity_hash(&["Deploy failed on staging"]);
        assert_eq!(h1, h2);
    }

    #[test]
    fn similarity_hash_near_duplicates_are_close() {
        let h1 = similarity_hash(&["Deploy failed on staging at 10:02:31"]);
        let h2 = similarity_hash(&["Deploy failed on staging at 10:02:45"]);
        assert!(hamming_distance(h1, h2) < 10);
    }

    #[test]
    fn self_reassignment_hash_is_stable() {
        let h1 = self_reassignment_hash("issue-tracker", "ENG-42");
        let h2 = self_reassignment_hash("issue-tracker", "ENG-42");
        assert_eq!(h1, h2);
    }
}
