//! In-memory user store used as the import target.

use super::passwords::{PasswordError, PasswordService};
use crate::import::{CreateError, EntityCreator, NewUser};
use crate::models::User;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use uuid::Uuid;

const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=50;
const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Invalid email regex")
    })
}

/// Lowercased emails and usernames already taken or being created.
#[derive(Default)]
struct Claims {
    emails: HashSet<String>,
    usernames: HashSet<String>,
}

/// Thread-safe user directory enforcing unique emails and usernames.
pub struct UserDirectory {
    users: DashMap<Uuid, User>,
    claims: Mutex<Claims>,
    passwords: PasswordService,
}

impl UserDirectory {
    pub fn new() -> Result<Self, PasswordError> {
        Ok(Self::with_password_service(PasswordService::new()?))
    }

    pub fn with_password_service(passwords: PasswordService) -> Self {
        Self {
            users: DashMap::new(),
            claims: Mutex::new(Claims::default()),
            passwords,
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn get(&self, id: &Uuid) -> Option<User> {
        self.users.get(id).map(|entry| entry.value().clone())
    }

    pub fn find_by_email(&self, email: &str) -> Option<User> {
        self.users
            .iter()
            .find(|entry| entry.email.eq_ignore_ascii_case(email))
            .map(|entry| entry.value().clone())
    }

    pub fn verify_password(&self, email: &str, password: &str) -> bool {
        self.find_by_email(email)
            .map(|user| {
                self.passwords
                    .verify_password(password, &user.password_hash)
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    fn validate(input: &NewUser) -> Result<(), CreateError> {
        let username_len = input.username.chars().count();
        if !USERNAME_LEN.contains(&username_len) {
            return Err(CreateError::new(format!(
                "username must be between {} and {} characters",
                USERNAME_LEN.start(),
                USERNAME_LEN.end()
            )));
        }
        if !email_regex().is_match(&input.email) {
            return Err(CreateError::new(format!("invalid email address '{}'", input.email)));
        }
        if input.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CreateError::new(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }

    /// Atomically claim the email and username for a new user. The claim is
    /// released when the returned guard drops without being committed.
    fn reserve(&self, email: String, username: String) -> Result<Reservation<'_>, CreateError> {
        let mut claims = self.claims.lock();
        if claims.emails.contains(&email) {
            return Err(CreateError::new("email already exists"));
        }
        if claims.usernames.contains(&username) {
            return Err(CreateError::new("username already exists"));
        }
        claims.emails.insert(email.clone());
        claims.usernames.insert(username.clone());
        Ok(Reservation {
            claims: &self.claims,
            email,
            username,
            committed: false,
        })
    }
}

/// Pending claim on an email/username pair, released on drop unless
/// committed. `create_user` may be dropped mid-hash when a run is cancelled.
struct Reservation<'a> {
    claims: &'a Mutex<Claims>,
    email: String,
    username: String,
    committed: bool,
}

impl Reservation<'_> {
    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        log::debug!("releasing claim on <{}>", self.email);
        let mut claims = self.claims.lock();
        claims.emails.remove(&self.email);
        claims.usernames.remove(&self.username);
    }
}

#[async_trait]
impl EntityCreator for UserDirectory {
    async fn create_user(&self, input: NewUser) -> Result<String, CreateError> {
        Self::validate(&input)?;

        let reservation = self.reserve(input.email.to_lowercase(), input.username.to_lowercase())?;

        let passwords = self.passwords.clone();
        let password = input.password;
        let password_hash = tokio::task::spawn_blocking(move || passwords.hash_password(&password))
            .await
            .map_err(|e| CreateError::new(format!("failed to hash password: {e}")))?
            .map_err(|e| CreateError::new(format!("failed to hash password: {e}")))?;

        let user = User {
            id: Uuid::new_v4(),
            username: input.username,
            email: input.email,
            password_hash,
            role: input.role,
            created_at: Utc::now(),
        };
        let id = user.id;
        log::trace!("created user {} <{}>", id, user.email);
        self.users.insert(id, user);
        reservation.commit();

        Ok(id.to_string())
    }
}
