use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::db::queries;
use crate::errors::AppError;
use crate::services::identity::memory::InMemoryIdentityProvider;
use crate::services::identity::{AccountRecord, IdentityProvider, ProviderError};

const LIST_USERS_LIMIT: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeleteUserResult {
    pub success: bool,
    pub message: String,
    pub uid: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FunctionError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Internal(String),

    #[error("functions endpoint unreachable: {0}")]
    Unavailable(String),
}

impl FunctionError {
    /// Maps a callable error status, in either wire (`NOT_FOUND`) or SDK (`not-found`) form.
    pub fn from_status(status: &str, message: String) -> Self {
        match status.to_ascii_lowercase().replace('_', "-").as_str() {
            "unauthenticated" => FunctionError::Unauthenticated(message),
            "permission-denied" => FunctionError::PermissionDenied(message),
            "not-found" => FunctionError::NotFound(message),
            "invalid-argument" => FunctionError::InvalidArgument(message),
            _ => FunctionError::Internal(message),
        }
    }
}

impl From<FunctionError> for AppError {
    fn from(e: FunctionError) -> Self {
        match e {
            FunctionError::Unauthenticated(msg) => AppError::Unauthenticated(msg),
            FunctionError::PermissionDenied(msg) => AppError::PermissionDenied(msg),
            FunctionError::NotFound(msg) => AppError::NotFound(msg),
            FunctionError::InvalidArgument(msg) => AppError::InvalidInput(msg),
            FunctionError::Internal(msg) | FunctionError::Unavailable(msg) => {
                AppError::RemoteUnavailable(msg)
            }
        }
    }
}

/// Server-side operations only an admin identity may invoke.
#[async_trait]
pub trait AdminFunctions: Send + Sync {
    /// Deletes the identity with this email, then its profile document.
    async fn delete_user(&self, email: &str) -> Result<DeleteUserResult, FunctionError>;

    async fn list_users(&self) -> Result<Vec<AccountRecord>, FunctionError>;
}

/// Client for HTTPS callable functions.
pub struct CallableFunctions {
    base_url: String,
    client: reqwest::Client,
    identity: Arc<dyn IdentityProvider>,
}

impl CallableFunctions {
    pub fn new(base_url: String, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            identity,
        }
    }

    async fn call(&self, name: &str, data: Value) -> Result<Value, FunctionError> {
        // Without a signed-in caller the request goes out bare and the function rejects it.
        let token = match self.identity.id_token().await {
            Ok(token) => Some(token),
            Err(ProviderError::NoCurrentUser) => None,
            Err(e) => return Err(FunctionError::Unavailable(e.to_string())),
        };

        let mut request = self
            .client
            .post(format!("{}/{name}", self.base_url))
            .json(&json!({ "data": data }));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| FunctionError::Unavailable(e.to_string()))?;
        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| FunctionError::Unavailable(format!("unreadable response: {e}")))?;

        if let Some(error) = body.get("error") {
            let message = error["message"].as_str().unwrap_or("unknown error").to_string();
            return Err(FunctionError::from_status(
                error["status"].as_str().unwrap_or("INTERNAL"),
                message,
            ));
        }
        if !status.is_success() {
            return Err(FunctionError::Internal(format!("HTTP {status}")));
        }

        Ok(body["result"].clone())
    }
}

#[async_trait]
impl AdminFunctions for CallableFunctions {
    async fn delete_user(&self, email: &str) -> Result<DeleteUserResult, FunctionError> {
        let result = self.call("deleteUser", json!({ "email": email })).await?;
        serde_json::from_value(result)
            .map_err(|e| FunctionError::Internal(format!("unexpected deleteUser result: {e}")))
    }

    async fn list_users(&self) -> Result<Vec<AccountRecord>, FunctionError> {
        let result = self.call("getUsers", json!({})).await?;
        serde_json::from_value(result["users"].clone())
            .map_err(|e| FunctionError::Internal(format!("unexpected getUsers result: {e}")))
    }
}

/// The same admin policy run in-process against the in-memory provider.
pub struct LocalFunctions {
    identity: Arc<InMemoryIdentityProvider>,
    db: Arc<Mutex<Connection>>,
}

impl LocalFunctions {
    pub fn new(identity: Arc<InMemoryIdentityProvider>, db: Arc<Mutex<Connection>>) -> Self {
        Self { identity, db }
    }

    fn authorize(&self) -> Result<(), FunctionError> {
        let caller = self
            .identity
            .current()
            .ok_or_else(|| FunctionError::Unauthenticated("User must be authenticated".to_string()))?;

        let profile = {
            let conn = self.db.lock().unwrap();
            queries::get_user(&conn, &caller.uid)
                .map_err(|e| FunctionError::Internal(e.to_string()))?
        };

        match profile {
            Some(user) if user.is_admin() => Ok(()),
            _ => Err(FunctionError::PermissionDenied("Admin access required".to_string())),
        }
    }
}

#[async_trait]
impl AdminFunctions for LocalFunctions {
    async fn delete_user(&self, email: &str) -> Result<DeleteUserResult, FunctionError> {
        self.authorize()?;

        if email.trim().is_empty() {
            return Err(FunctionError::InvalidArgument("Email is required".to_string()));
        }

        let account = self
            .identity
            .account_by_email(email)
            .ok_or_else(|| FunctionError::NotFound("User not found in Authentication".to_string()))?;

        if !self.identity.delete_account(&account.uid) {
            return Err(FunctionError::NotFound("User not found in Authentication".to_string()));
        }

        let profile_deleted = {
            let conn = self.db.lock().unwrap();
            queries::delete_user(&conn, &account.uid)
        };
        match profile_deleted {
            Ok(true) => {}
            Ok(false) => tracing::info!(uid = %account.uid, "profile already absent"),
            Err(e) => tracing::warn!(uid = %account.uid, error = %e, "profile delete failed"),
        }

        tracing::info!(uid = %account.uid, email, "user deleted");
        Ok(DeleteUserResult {
            success: true,
            message: format!("User {email} deleted successfully"),
            uid: account.uid,
        })
    }

    async fn list_users(&self) -> Result<Vec<AccountRecord>, FunctionError> {
        self.authorize()?;
        Ok(self.identity.list_accounts(LIST_USERS_LIMIT))
    }
}
