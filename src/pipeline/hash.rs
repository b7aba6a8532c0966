use sha2::{Digest, Sha256};

/// SHA-256 hex digest. Matches the manifest's `contentHash` of the
/// preprocessed entry bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Hash of an aggregation's full input set: the prompt-version tag plus the
/// ordered (natural key, body hash) pairs of every input read. Changing any
/// input, the input order, or the prompt text changes this hash and thereby
/// every cache key downstream.
pub fn input_hash(prompt_version: &str, inputs: &[(String, String)]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt_version.as_bytes());
    for (key, body_hash) in inputs {
        hasher.update([0x1f]);
        hasher.update(key.as_bytes());
        hasher.update([0x1f]);
        hasher.update(body_hash.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, h)| (k.to_string(), h.to_string()))
            .collect()
    }

    #[test]
    fn sha256_hex_is_deterministic() {
        let a = sha256_hex(b"march third, quiet day");
        let b = sha256_hex(b"march third, quiet day");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, sha256_hex(b"march third, loud day"));
    }

    #[test]
    fn input_hash_is_a_function_of_the_ordered_inputs() {
        let one = input_hash("v3", &pairs(&[("2025-03-03", "aa"), ("2025-03-04", "bb")]));
        let same = input_hash("v3", &pairs(&[("2025-03-03", "aa"), ("2025-03-04", "bb")]));
        let reordered = input_hash("v3", &pairs(&[("2025-03-04", "bb"), ("2025-03-03", "aa")]));
        assert_eq!(one, same);
        assert_ne!(one, reordered);
    }

    #[test]
    fn prompt_version_invalidates_the_hash() {
        let inputs = pairs(&[("2025-03-03", "aa")]);
        assert_ne!(input_hash("v3", &inputs), input_hash("v4", &inputs));
    }

    #[test]
    fn splitting_one_pair_into_two_changes_the_hash() {
        let one = input_hash("v3", &pairs(&[("2025-03-03", "aabb")]));
        let two = input_hash("v3", &pairs(&[("2025-03-03", "aa"), ("bb", "")]));
        assert_ne!(one, two);
    }
}
