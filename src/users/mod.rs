//! User accounts created by imports.

pub mod directory;
pub mod passwords;

pub use directory::UserDirectory;
pub use passwords::{PasswordError, PasswordService};
