use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, PasswordHasher as _, Version,
};
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};

use crate::config::PasswordConfig;

const BASE58_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Argon2id hasher with configurable cost.
///
/// Verification reads algorithm and cost from the stored PHC string, so
/// hashes created under older parameters keep verifying after a change.
///
/// A throwaway hash made with the configured cost backs `verify_dummy`,
/// which rejection paths call so a miss costs as much as a mismatch.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
    dummy_hash: String,
}

impl PasswordHasher {
    pub fn new(config: &PasswordConfig) -> Result<Self, anyhow::Error> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 parameters: {}", e))?;

        let mut hasher = Self {
            params,
            dummy_hash: String::new(),
        };
        hasher.dummy_hash = hasher.hash(&random_secret(32))?;

        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a secret. A fresh salt is generated and embedded in the output.
    pub fn hash(&self, password: &SecretString) -> Result<String, anyhow::Error> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon2()
            .hash_password(password.expose_secret().as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();

        Ok(hash)
    }

    /// Constant-time comparison of `password` against a stored PHC hash.
    pub fn verify(&self, password: &SecretString, password_hash: &str) -> Result<(), anyhow::Error> {
        let parsed_hash = PasswordHash::new(password_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;

        self.argon2()
            .verify_password(password.expose_secret().as_bytes(), &parsed_hash)
            .map_err(|_| anyhow::anyhow!("Password verification failed"))
    }

    /// Run a full verification against the throwaway hash and discard it.
    pub fn verify_dummy(&self, password: &SecretString) {
        let _ = self.verify(password, &self.dummy_hash);
    }
}

/// Random base58 string suitable for generated passwords and client secrets.
pub fn random_secret(len: usize) -> SecretString {
    let mut rng = rand::thread_rng();
    let secret: String = (0..len)
        .map(|_| BASE58_ALPHABET[rng.gen_range(0..BASE58_ALPHABET.len())] as char)
        .collect();
    SecretString::new(secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(&PasswordConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    fn secret(s: &str) -> SecretString {
        SecretString::new(s.to_string())
    }

    #[test]
    fn test_hash_is_argon2id() {
        let hash = hasher().hash(&secret("mySecurePassword123")).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("mySecurePassword123"));
    }

    #[test]
    fn test_verify_password_correct() {
        let hasher = hasher();
        let hash = hasher.hash(&secret("mySecurePassword123")).unwrap();
        assert!(hasher.verify(&secret("mySecurePassword123"), &hash).is_ok());
    }

    #[test]
    fn test_verify_password_incorrect() {
        let hasher = hasher();
        let hash = hasher.hash(&secret("mySecurePassword123")).unwrap();
        assert!(hasher.verify(&secret("wrongPassword"), &hash).is_err());
    }

    #[test]
    fn test_verify_uses_parameters_from_hash() {
        let strong = PasswordHasher::new(&PasswordConfig {
            memory_kib: 2048,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        let hash = strong.hash(&secret("pw")).unwrap();

        assert!(hasher().verify(&secret("pw"), &hash).is_ok());
    }

    #[test]
    fn test_malformed_hash_is_error() {
        assert!(hasher().verify(&secret("pw"), "not-a-hash").is_err());
    }

    #[test]
    fn test_dummy_hash_uses_configured_cost() {
        let hasher = hasher();
        let parsed = PasswordHash::new(&hasher.dummy_hash).unwrap();
        assert_eq!(parsed.algorithm.as_str(), "argon2id");
        let params = Params::try_from(&parsed).unwrap();
        assert_eq!(params.m_cost(), hasher.params.m_cost());
        assert_eq!(params.t_cost(), hasher.params.t_cost());
        assert_eq!(params.p_cost(), hasher.params.p_cost());
    }

    #[test]
    fn test_dummy_hash_matches_no_input() {
        let hasher = hasher();
        for input in ["", "pw", "mySecurePassword123"] {
            assert!(hasher.verify(&secret(input), &hasher.dummy_hash).is_err());
        }
        hasher.verify_dummy(&secret("pw"));
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let result = PasswordHasher::new(&PasswordConfig {
            memory_kib: 1,
            iterations: 1,
            parallelism: 1,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_random_secret_uses_base58() {
        let value = random_secret(32);
        let value = value.expose_secret();
        assert_eq!(value.len(), 32);
        assert!(value.bytes().all(|b| BASE58_ALPHABET.contains(&b)));
        assert_ne!(value, random_secret(32).expose_secret());
    }
}
