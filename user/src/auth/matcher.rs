//! Credential hashing and verification.
//!
//! New secrets are hashed with Argon2id. The iterated salted digests (`sha256`,
//! `md5`) exist so that user tables migrated from older deployments keep
//! working; they are never chosen by default.
//!
//! Legacy digest: `H(salt ‖ plaintext)`, then `H` applied to the output
//! `iterations - 1` more times, stored as lowercase hex.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use md5::Md5;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use subtle::ConstantTimeEq;
use tracing::{error, warn};

use crate::error::{Result, UserError};

/// Default iteration count for the legacy digests
pub const LEGACY_ITERATIONS: u32 = 1024;

/// Highest legacy digest iteration count accepted from a stored record
pub const MAX_LEGACY_ITERATIONS: u32 = 1_000_000;

/// Highest argon2 time cost accepted from configuration or a stored record
pub const MAX_ARGON2_ITERATIONS: u32 = 64;

/// Highest argon2 memory cost (KiB) accepted from a stored PHC string
pub const MAX_ARGON2_MEMORY_KIB: u32 = 256 * 1024;

/// Hash algorithm recorded next to every stored secret
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Argon2id,
    /// Compatibility only
    Sha256,
    /// Compatibility only
    Md5,
}

impl HashAlgorithm {
    pub fn default_iterations(&self) -> u32 {
        match self {
            HashAlgorithm::Argon2id => Params::DEFAULT_T_COST,
            HashAlgorithm::Sha256 | HashAlgorithm::Md5 => LEGACY_ITERATIONS,
        }
    }

    /// Upper bound on the work factor a record may ask for
    pub fn max_iterations(&self) -> u32 {
        match self {
            HashAlgorithm::Argon2id => MAX_ARGON2_ITERATIONS,
            HashAlgorithm::Sha256 | HashAlgorithm::Md5 => MAX_LEGACY_ITERATIONS,
        }
    }

    pub fn is_legacy(&self) -> bool {
        !matches!(self, HashAlgorithm::Argon2id)
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Argon2id => write!(f, "argon2id"),
            HashAlgorithm::Sha256 => write!(f, "sha256"),
            HashAlgorithm::Md5 => write!(f, "md5"),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = UserError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "argon2id" | "argon2" => Ok(HashAlgorithm::Argon2id),
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            "md5" => Ok(HashAlgorithm::Md5),
            other => Err(UserError::Configuration(format!(
                "Unknown hash algorithm: {}",
                other
            ))),
        }
    }
}

/// A stored secret as read from the `users` table.
///
/// For Argon2id `hash` is a PHC string that embeds its own salt; `salt`
/// mirrors it for the record. For the legacy digests `hash` is hex and
/// `salt` is mixed in as UTF-8 bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretRecord {
    pub hash: String,
    pub salt: String,
    pub algorithm: HashAlgorithm,
    pub iterations: u32,
}

impl fmt::Debug for SecretRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretRecord")
            .field("hash", &"<redacted>")
            .field("salt", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("iterations", &self.iterations)
            .finish()
    }
}

/// Matcher configuration, as found in the `credentials` config section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub algorithm: HashAlgorithm,
    pub iterations: Option<u32>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::Argon2id,
            iterations: None,
        }
    }
}

/// Hashes new secrets with the configured algorithm and verifies stored
/// secrets with whatever algorithm their record names.
#[derive(Debug, Clone)]
pub struct CredentialsMatcher {
    algorithm: HashAlgorithm,
    iterations: u32,
}

impl Default for CredentialsMatcher {
    fn default() -> Self {
        Self::new(HashAlgorithm::Argon2id, None)
    }
}

impl CredentialsMatcher {
    pub fn new(algorithm: HashAlgorithm, iterations: Option<u32>) -> Self {
        let mut iterations = iterations
            .filter(|n| *n > 0)
            .unwrap_or_else(|| algorithm.default_iterations());
        if iterations > algorithm.max_iterations() {
            warn!(
                "{} iterations for {} exceeds the limit, using {}",
                iterations,
                algorithm,
                algorithm.max_iterations()
            );
            iterations = algorithm.max_iterations();
        }
        if algorithm.is_legacy() {
            warn!(
                "Credentials matcher configured with legacy algorithm {}; use argon2id for new deployments",
                algorithm
            );
        }
        Self {
            algorithm,
            iterations,
        }
    }

    pub fn from_config(config: &MatcherConfig) -> Self {
        Self::new(config.algorithm, config.iterations)
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Hash `plaintext` with a fresh random salt.
    pub fn hash(&self, plaintext: &str) -> Result<SecretRecord> {
        match self.algorithm {
            HashAlgorithm::Argon2id => {
                let salt = SaltString::generate(&mut OsRng);
                let hash = self
                    .argon2()?
                    .hash_password(plaintext.as_bytes(), &salt)
                    .map_err(|e| UserError::Hashing(e.to_string()))?
                    .to_string();
                Ok(SecretRecord {
                    hash,
                    salt: salt.as_str().to_string(),
                    algorithm: self.algorithm,
                    iterations: self.iterations,
                })
            }
            legacy => {
                let salt = Self::generate_salt();
                let digest = legacy_digest(
                    legacy,
                    salt.as_bytes(),
                    plaintext.as_bytes(),
                    self.iterations,
                );
                Ok(SecretRecord {
                    hash: hex::encode(digest),
                    salt,
                    algorithm: legacy,
                    iterations: self.iterations,
                })
            }
        }
    }

    /// [`hash`](Self::hash) on the blocking thread pool.
    pub async fn hash_password(&self, plaintext: &str) -> Result<SecretRecord> {
        let matcher = self.clone();
        let plaintext = plaintext.to_string();
        tokio::task::spawn_blocking(move || matcher.hash(&plaintext))
            .await
            .map_err(|e| UserError::Hashing(format!("hashing task failed: {}", e)))?
    }

    /// [`matches`](Self::matches) on the blocking thread pool, so slow hashes
    /// never stall the async workers.
    pub async fn verify(&self, plaintext: &str, stored: &SecretRecord) -> bool {
        let matcher = self.clone();
        let plaintext = plaintext.to_string();
        let stored = stored.clone();
        match tokio::task::spawn_blocking(move || matcher.matches(&plaintext, &stored)).await {
            Ok(matched) => matched,
            Err(e) => {
                error!("Credential verification task failed: {}", e);
                false
            }
        }
    }

    /// Recompute and compare in constant time.
    ///
    /// A malformed stored hash, or one asking for more work than the limits
    /// allow, never matches.
    pub fn matches(&self, plaintext: &str, stored: &SecretRecord) -> bool {
        if stored.iterations > stored.algorithm.max_iterations() {
            warn!(
                "Stored {} hash asks for {} iterations, refusing",
                stored.algorithm, stored.iterations
            );
            return false;
        }

        match stored.algorithm {
            HashAlgorithm::Argon2id => {
                let parsed = match PasswordHash::new(&stored.hash) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        warn!("Stored argon2 hash is malformed: {}", e);
                        return false;
                    }
                };
                let t_cost = parsed.params.get_decimal("t").unwrap_or(0);
                let m_cost = parsed.params.get_decimal("m").unwrap_or(0);
                if t_cost > MAX_ARGON2_ITERATIONS || m_cost > MAX_ARGON2_MEMORY_KIB {
                    warn!(
                        "Stored argon2 hash asks for t={} m={}, refusing",
                        t_cost, m_cost
                    );
                    return false;
                }
                // parameters come from the PHC string, not from this matcher
                Argon2::default()
                    .verify_password(plaintext.as_bytes(), &parsed)
                    .is_ok()
            }
            legacy => {
                let expected = match hex::decode(&stored.hash) {
                    Ok(expected) => expected,
                    Err(e) => {
                        warn!("Stored {} hash is not valid hex: {}", legacy, e);
                        return false;
                    }
                };
                let computed = legacy_digest(
                    legacy,
                    stored.salt.as_bytes(),
                    plaintext.as_bytes(),
                    stored.iterations,
                );
                computed.ct_eq(&expected).into()
            }
        }
    }

    fn argon2(&self) -> Result<Argon2<'static>> {
        let params = Params::new(
            Params::DEFAULT_M_COST,
            self.iterations,
            Params::DEFAULT_P_COST,
            None,
        )
        .map_err(|e| UserError::Hashing(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    fn generate_salt() -> String {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill(&mut bytes);
        hex::encode(bytes)
    }
}

fn legacy_digest(algorithm: HashAlgorithm, salt: &[u8], plaintext: &[u8], iterations: u32) -> Vec<u8> {
    match algorithm {
        HashAlgorithm::Md5 => iterated::<Md5>(salt, plaintext, iterations),
        HashAlgorithm::Sha256 | HashAlgorithm::Argon2id => {
            iterated::<Sha256>(salt, plaintext, iterations)
        }
    }
}

fn iterated<D: Digest>(salt: &[u8], plaintext: &[u8], iterations: u32) -> Vec<u8> {
    let mut hasher = D::new();
    hasher.update(salt);
    hasher.update(plaintext);
    let mut output = hasher.finalize().to_vec();
    for _ in 1..iterations.max(1) {
        output = D::digest(&output).to_vec();
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn legacy_record(algorithm: HashAlgorithm, hash: &str, iterations: u32) -> SecretRecord {
        SecretRecord {
            hash: hash.to_string(),
            salt: "pepper".to_string(),
            algorithm,
            iterations,
        }
    }

    #[rstest]
    #[case(HashAlgorithm::Md5, 1024, "66abb30835a2fdb57fe93cee6de84257")]
    #[case(HashAlgorithm::Md5, 1, "afcd70a1438b9b8ce9be72e89ca602a8")]
    #[case(
        HashAlgorithm::Sha256,
        1,
        "744a9101f7182a6ae0d978121ff74e33cac8d2832579c0637c1c37e9bbb6c065"
    )]
    fn test_legacy_known_vectors(
        #[case] algorithm: HashAlgorithm,
        #[case] iterations: u32,
        #[case] hash: &str,
    ) {
        let matcher = CredentialsMatcher::default();
        let record = legacy_record(algorithm, hash, iterations);
        assert!(matcher.matches("secret", &record));
        assert!(!matcher.matches("Secret", &record));
        assert!(!matcher.matches("", &record));
    }

    #[test]
    fn test_argon2_round_trip() {
        let matcher = CredentialsMatcher::default();
        let record = matcher.hash("correct horse").unwrap();

        assert_eq!(record.algorithm, HashAlgorithm::Argon2id);
        assert!(record.hash.starts_with("$argon2id$"));
        assert!(record.hash.contains(&record.salt));
        assert!(matcher.matches("correct horse", &record));
        assert!(!matcher.matches("battery staple", &record));
    }

    #[test]
    fn test_legacy_hash_uses_fresh_salt() {
        let matcher = CredentialsMatcher::new(HashAlgorithm::Md5, None);
        let first = matcher.hash("secret").unwrap();
        let second = matcher.hash("secret").unwrap();

        assert_eq!(first.iterations, LEGACY_ITERATIONS);
        assert_ne!(first.salt, second.salt);
        assert_ne!(first.hash, second.hash);
        assert!(matcher.matches("secret", &first));
        assert!(matcher.matches("secret", &second));
    }

    #[test]
    fn test_verification_follows_the_stored_algorithm() {
        let legacy = CredentialsMatcher::new(HashAlgorithm::Sha256, Some(3));
        let record = legacy.hash("secret").unwrap();

        // an argon2 matcher still verifies records written by the legacy one
        assert!(CredentialsMatcher::default().matches("secret", &record));
    }

    #[test]
    fn test_malformed_hashes_never_match() {
        let matcher = CredentialsMatcher::default();
        assert!(!matcher.matches("secret", &legacy_record(HashAlgorithm::Md5, "zz-not-hex", 1)));
        assert!(!matcher.matches(
            "secret",
            &legacy_record(HashAlgorithm::Argon2id, "not a phc string", 2)
        ));
        // truncated digest: length mismatch is a non-match, not a panic
        assert!(!matcher.matches("secret", &legacy_record(HashAlgorithm::Md5, "66abb308", 1024)));
    }

    #[test]
    fn test_excessive_work_factors_are_refused() {
        let matcher = CredentialsMatcher::default();
        let greedy = legacy_record(HashAlgorithm::Md5, "66abb30835a2fdb57fe93cee6de84257", u32::MAX);
        assert!(!matcher.matches("secret", &greedy));

        let record = matcher.hash("secret").unwrap();
        let heavy = SecretRecord {
            hash: record.hash.replace("m=19456", "m=4194304"),
            ..record.clone()
        };
        assert_ne!(heavy.hash, record.hash);
        assert!(!matcher.matches("secret", &heavy));
    }

    #[test]
    fn test_configured_iterations_are_capped() {
        let matcher = CredentialsMatcher::new(HashAlgorithm::Sha256, Some(u32::MAX));
        assert_eq!(matcher.iterations(), MAX_LEGACY_ITERATIONS);

        let matcher = CredentialsMatcher::new(HashAlgorithm::Argon2id, Some(1000));
        assert_eq!(matcher.iterations(), MAX_ARGON2_ITERATIONS);
    }

    #[tokio::test]
    async fn test_async_hash_and_verify() {
        let matcher = CredentialsMatcher::new(HashAlgorithm::Sha256, Some(1));
        let record = matcher.hash_password("secret").await.unwrap();

        assert!(matcher.verify("secret", &record).await);
        assert!(!matcher.verify("guess", &record).await);
    }

    #[rstest]
    #[case("argon2id", HashAlgorithm::Argon2id)]
    #[case("ARGON2", HashAlgorithm::Argon2id)]
    #[case("sha-256", HashAlgorithm::Sha256)]
    #[case(" md5 ", HashAlgorithm::Md5)]
    fn test_algorithm_parsing(#[case] input: &str, #[case] expected: HashAlgorithm) {
        assert_eq!(input.parse::<HashAlgorithm>().unwrap(), expected);
        assert_eq!(expected.to_string().parse::<HashAlgorithm>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_algorithm() {
        assert!("bcrypt".parse::<HashAlgorithm>().is_err());
    }

    #[test]
    fn test_secret_record_debug_is_redacted() {
        let record = legacy_record(HashAlgorithm::Md5, "66abb30835a2fdb57fe93cee6de84257", 1024);
        let debug = format!("{:?}", record);
        assert!(!debug.contains("66abb308"));
        assert!(!debug.contains("pepper"));
    }

    #[test]
    fn test_zero_iterations_fall_back_to_default() {
        let matcher = CredentialsMatcher::new(HashAlgorithm::Md5, Some(0));
        assert_eq!(matcher.iterations(), LEGACY_ITERATIONS);
    }
}
