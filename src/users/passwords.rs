use argon2::{
    Algorithm, Argon2, ParamsBuilder, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use rand::RngCore;
use thiserror::Error;

const SALT_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("argon2 parameter error: {0}")]
    Params(String),
    #[error("password hashing error: {0}")]
    Hash(String),
}

impl From<argon2::Error> for PasswordError {
    fn from(err: argon2::Error) -> Self {
        PasswordError::Params(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for PasswordError {
    fn from(err: argon2::password_hash::Error) -> Self {
        PasswordError::Hash(err.to_string())
    }
}

#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
}

impl PasswordService {
    pub fn new() -> Result<Self, PasswordError> {
        Self::with_cost(19 * 1024, 2) // 19 MiB
    }

    /// Argon2id with explicit memory (KiB) and iteration cost.
    pub fn with_cost(m_cost_kib: u32, t_cost: u32) -> Result<Self, PasswordError> {
        let mut builder = ParamsBuilder::new();
        builder.m_cost(m_cost_kib);
        builder.t_cost(t_cost);
        builder.p_cost(1);
        let params = builder.build()?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        Ok(Self { argon2 })
    }

    pub fn hash_password(&self, password: &str) -> Result<String, PasswordError> {
        let mut salt_bytes = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)?;
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)?
            .to_string();
        Ok(hash)
    }

    pub fn verify_password(&self, password: &str, encoded: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(encoded)?;
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(err) => Err(PasswordError::from(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_and_verifies_passwords() {
        let service = PasswordService::with_cost(64, 1).expect("password service");
        let hash = service.hash_password("super-secret").expect("hash generation");
        assert!(hash.starts_with("$argon2id$"));
        assert!(service.verify_password("super-secret", &hash).expect("verify succeeds"));
        assert!(!service.verify_password("wrong-password", &hash).expect("verify runs"));
    }

    #[test]
    fn rejects_impossible_params() {
        assert!(matches!(
            PasswordService::with_cost(1, 1),
            Err(PasswordError::Params(_))
        ));
    }
}
