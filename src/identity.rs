// identity.rs
use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Who is voting, as far as we can tell. Neither field alone is
/// authoritative: a match on either one means "same voter" for dedup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterIdentity {
    /// Opaque token the client generates once and stores locally.
    pub client_token: String,
    /// One-way hash of the request IP at submission time.
    pub ip_hash: String,
}

pub fn resolve(raw_ip: &str, client_token: &str) -> VoterIdentity {
    VoterIdentity {
        client_token: client_token.to_string(),
        ip_hash: hash_ip(raw_ip),
    }
}

/// SHA-256 hex of the raw IP string. A missing IP hashes "", so every
/// unknown-IP client collapses into one shared fallback identity. That is
/// the accepted tradeoff, same as voters behind one NAT sharing a hash.
pub fn hash_ip(raw_ip: &str) -> String {
    Sha256::digest(raw_ip.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Short human-scannable correlation id: prefix, millisecond timestamp,
/// three random digits. Not unique in any cryptographic sense; a collision
/// costs a confusing cross-reference, nothing more.
pub fn new_unique_id(prefix: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1000);
    format!("{}-{}{:03}", prefix, Utc::now().timestamp_millis(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash_ip("203.0.113.9"), hash_ip("203.0.113.9"));
        assert_ne!(hash_ip("203.0.113.9"), hash_ip("203.0.113.10"));
    }

    #[test]
    fn missing_ip_shares_the_fallback_identity() {
        let a = resolve("", "tok-a");
        let b = resolve("", "tok-b");
        assert_eq!(a.ip_hash, b.ip_hash);
        assert_eq!(a.ip_hash, hash_ip(""));
    }

    #[test]
    fn unique_ids_carry_the_prefix() {
        let id = new_unique_id("PV");
        assert!(id.starts_with("PV-"));
        assert!(id.len() > 3);
    }
}
