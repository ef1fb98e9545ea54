pub mod firebase;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// The identity provider's view of an account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Identity {
    pub uid: String,
    pub email: String,
    pub email_verified: bool,
    pub display_name: Option<String>,
}

/// Account listing entry as returned by the privileged `listUsers` function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub disabled: bool,
    pub created_at: Option<String>,
    pub last_sign_in: Option<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("email already in use")]
    EmailAlreadyInUse,

    #[error("password should be at least 6 characters")]
    WeakPassword,

    #[error("invalid email address")]
    InvalidEmail,

    #[error("no account found with this email")]
    UserNotFound,

    #[error("incorrect password")]
    WrongPassword,

    #[error("invalid credentials")]
    InvalidCredential,

    #[error("too many attempts")]
    TooManyRequests,

    #[error("session token expired")]
    TokenExpired,

    #[error("account disabled")]
    UserDisabled,

    #[error("no user signed in")]
    NoCurrentUser,

    #[error("identity provider rejected the request: {0}")]
    Rejected(String),

    #[error("identity provider unreachable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Maps an Identity Toolkit error message (`"CODE"` or `"CODE : detail"`).
    pub fn from_code(message: &str) -> Self {
        let code = message
            .split(|c: char| c == ' ' || c == ':')
            .next()
            .unwrap_or("");
        match code {
            "EMAIL_EXISTS" => ProviderError::EmailAlreadyInUse,
            "WEAK_PASSWORD" => ProviderError::WeakPassword,
            "INVALID_EMAIL" | "MISSING_EMAIL" => ProviderError::InvalidEmail,
            "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" => ProviderError::UserNotFound,
            "INVALID_PASSWORD" => ProviderError::WrongPassword,
            "INVALID_LOGIN_CREDENTIALS" => ProviderError::InvalidCredential,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => ProviderError::TooManyRequests,
            "TOKEN_EXPIRED" | "INVALID_ID_TOKEN" | "INVALID_REFRESH_TOKEN" => {
                ProviderError::TokenExpired
            }
            "USER_DISABLED" => ProviderError::UserDisabled,
            _ => ProviderError::Rejected(message.to_string()),
        }
    }
}

/// Email/password identity service of record.
///
/// Implementations keep at most one signed-in identity and announce every
/// change of it (sign-in, sign-out, expiry) on the channel returned by
/// [`IdentityProvider::subscribe`], in the order the changes happen.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Creates the account and signs it in.
    async fn create_account(&self, email: &str, password: &str)
        -> Result<Identity, ProviderError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, ProviderError>;

    async fn sign_out(&self) -> Result<(), ProviderError>;

    fn current(&self) -> Option<Identity>;

    /// Re-reads the signed-in account, picking up a flipped verification flag.
    async fn reload(&self) -> Result<Identity, ProviderError>;

    async fn send_verification_email(&self) -> Result<(), ProviderError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), ProviderError>;

    async fn update_display_name(&self, name: &str) -> Result<(), ProviderError>;

    /// A freshly minted ID token for the signed-in account.
    async fn id_token(&self) -> Result<String, ProviderError>;

    fn subscribe(&self) -> broadcast::Receiver<Option<Identity>>;
}
