use crate::models::UserRole;
use async_trait::async_trait;
use thiserror::Error;

/// Validated input handed to an [`EntityCreator`].
#[derive(Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Opaque creation failure. The message is reported verbatim in outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CreateError(pub String);

impl CreateError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Creates one user and returns its identifier.
///
/// Implementations are called from every import worker at once and must be
/// safe for concurrent use.
#[async_trait]
pub trait EntityCreator: Send + Sync {
    async fn create_user(&self, input: NewUser) -> Result<String, CreateError>;
}
