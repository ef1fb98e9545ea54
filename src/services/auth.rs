use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Role, User, ADMIN_EMAIL};
use crate::services::identity::{Identity, IdentityProvider, ProviderError};
use crate::services::validation;

const DEMO_ADMIN_PASSWORD: &str = "admin123";
const DEMO_ADMIN_NAME: &str = "Admin User";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("User with this email already exists")]
    DuplicateAccount,

    #[error("Password should be at least 6 characters")]
    WeakPassword,

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Incorrect password")]
    WrongCredentials,

    #[error("Too many failed attempts. Please try again later")]
    RateLimited,

    #[error("Please verify your email before logging in. Check your inbox for a verification link.")]
    UnverifiedEmail,

    #[error("No user logged in")]
    NotLoggedIn,

    #[error("{0}")]
    Remote(String),

    #[error("profile store error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl From<ProviderError> for AuthError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::EmailAlreadyInUse => AuthError::DuplicateAccount,
            ProviderError::WeakPassword => AuthError::WeakPassword,
            ProviderError::InvalidEmail => AuthError::InvalidEmail,
            ProviderError::UserNotFound => {
                AuthError::NotFound("No account found with this email".to_string())
            }
            ProviderError::WrongPassword | ProviderError::InvalidCredential => {
                AuthError::WrongCredentials
            }
            ProviderError::TooManyRequests => AuthError::RateLimited,
            ProviderError::NoCurrentUser | ProviderError::TokenExpired => AuthError::NotLoggedIn,
            ProviderError::UserDisabled => AuthError::Remote("This account has been disabled".to_string()),
            ProviderError::Rejected(msg) | ProviderError::Unavailable(msg) => AuthError::Remote(msg),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::DuplicateAccount => AppError::DuplicateAccount,
            AuthError::WeakPassword | AuthError::InvalidEmail => AppError::InvalidInput(e.to_string()),
            AuthError::InvalidInput(msg) => AppError::InvalidInput(msg),
            AuthError::NotFound(msg) => AppError::NotFound(msg),
            AuthError::WrongCredentials | AuthError::NotLoggedIn => {
                AppError::Unauthenticated(e.to_string())
            }
            AuthError::RateLimited => AppError::RateLimited,
            AuthError::UnverifiedEmail => AppError::UnverifiedEmail,
            AuthError::Remote(msg) => AppError::RemoteUnavailable(msg),
            AuthError::Store(e) => AppError::Database(e),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileUpdate {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

fn validate_signup(req: &SignupRequest) -> Result<(), AuthError> {
    let checks = [
        validation::require(&req.name, "Name is required"),
        validation::validate_email(&req.email),
        validation::require(&req.password, "Password is required"),
    ];
    for check in checks {
        check.map_err(AuthError::InvalidInput)?;
    }
    if req.password != req.confirm_password {
        return Err(AuthError::InvalidInput("Passwords do not match".to_string()));
    }
    Ok(())
}

/// Handle for a session-change listener. Events stop when it is
/// unsubscribed or dropped.
#[must_use = "dropping the subscription stops session events"]
pub struct SessionSubscription {
    task: JoinHandle<()>,
}

impl SessionSubscription {
    pub fn unsubscribe(self) {
        self.task.abort();
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn profile_for(db: &Mutex<Connection>, identity: Option<&Identity>) -> Option<User> {
    let identity = identity?;
    let conn = db.lock().unwrap();
    match queries::get_user(&conn, &identity.uid) {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(uid = %identity.uid, error = %e, "profile lookup failed");
            None
        }
    }
}

/// The only component that talks to the identity provider and writes
/// user profiles on behalf of the signed-in user.
#[derive(Clone)]
pub struct AuthGateway {
    identity: Arc<dyn IdentityProvider>,
    db: Arc<Mutex<Connection>>,
}

impl AuthGateway {
    pub fn new(identity: Arc<dyn IdentityProvider>, db: Arc<Mutex<Connection>>) -> Self {
        Self { identity, db }
    }

    fn with_db<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, AuthError> {
        let conn = self.db.lock().unwrap();
        Ok(f(&conn)?)
    }

    pub async fn signup(&self, req: &SignupRequest) -> Result<User, AuthError> {
        validate_signup(req)?;
        tracing::info!(email = %req.email, "starting signup");

        if self
            .with_db(|conn| queries::find_user_by_email(conn, &req.email))?
            .is_some()
        {
            return Err(AuthError::DuplicateAccount);
        }

        let identity = self
            .identity
            .create_account(&req.email, &req.password)
            .await
            .map_err(|e| match e {
                ProviderError::InvalidCredential => AuthError::Remote(
                    "Invalid credentials. Please check the identity provider configuration."
                        .to_string(),
                ),
                other => other.into(),
            })?;

        self.identity.send_verification_email().await?;

        let user = User {
            id: identity.uid.clone(),
            email: req.email.clone(),
            name: req.name.clone(),
            phone: req.phone.clone().filter(|p| !p.trim().is_empty()),
            created_at: Utc::now(),
            email_verified: false,
            role: Role::User,
        };
        self.with_db(|conn| queries::save_user(conn, &user))?;
        self.identity.update_display_name(&user.name).await?;

        tracing::info!(uid = %user.id, "signup completed");
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::InvalidInput("Please fill in all fields".to_string()));
        }

        let identity = self.identity.sign_in(email, password).await?;

        let mut user = self
            .with_db(|conn| queries::get_user(conn, &identity.uid))?
            .ok_or_else(|| AuthError::NotFound("User profile not found".to_string()))?;

        if email == ADMIN_EMAIL {
            return Ok(user);
        }

        if !identity.email_verified {
            tracing::info!(uid = %identity.uid, "login refused: email not verified");
            return Err(AuthError::UnverifiedEmail);
        }

        if !user.email_verified {
            self.with_db(|conn| queries::set_email_verified(conn, &user.id, true))?;
            user.email_verified = true;
        }

        Ok(user)
    }

    /// Signs out remotely; failures are logged and never surfaced.
    pub async fn logout(&self) {
        if let Err(e) = self.identity.sign_out().await {
            tracing::warn!(error = %e, "remote sign-out failed");
        }
    }

    pub async fn resend_verification(&self) -> Result<(), AuthError> {
        if self.identity.current().is_none() {
            return Err(AuthError::NotLoggedIn);
        }
        self.identity.send_verification_email().await?;
        Ok(())
    }

    pub async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        validation::validate_email(email).map_err(AuthError::InvalidInput)?;
        self.identity
            .send_password_reset(email)
            .await
            .map_err(|e| match e {
                ProviderError::UserNotFound => {
                    AuthError::NotFound("No account found with this email address".to_string())
                }
                other => other.into(),
            })
    }

    /// Re-reads the provider's verification flag and mirrors a `true` into the profile.
    pub async fn check_verification_status(&self, user_id: &str) -> Result<bool, AuthError> {
        if self.identity.current().is_none() {
            return Err(AuthError::NotLoggedIn);
        }

        let identity = self.identity.reload().await?;
        if !identity.email_verified {
            return Ok(false);
        }

        let updated = self.with_db(|conn| queries::set_email_verified(conn, user_id, true))?;
        if !updated {
            return Err(AuthError::NotFound("User profile not found".to_string()));
        }
        tracing::info!(uid = user_id, "email verification synchronised");
        Ok(true)
    }

    pub fn current_user(&self) -> Result<Option<User>, AuthError> {
        match self.identity.current() {
            Some(identity) => self.with_db(|conn| queries::get_user(conn, &identity.uid)),
            None => Ok(None),
        }
    }

    pub fn profile(&self, user_id: &str) -> Result<Option<User>, AuthError> {
        self.with_db(|conn| queries::get_user(conn, user_id))
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<User, AuthError> {
        validation::require(&update.name, "Name is required").map_err(AuthError::InvalidInput)?;
        let phone = update.phone.as_deref().filter(|p| !p.trim().is_empty());

        let user = self.with_db(|conn| {
            if !queries::update_user_profile(conn, user_id, &update.name, phone)? {
                return Ok(None);
            }
            queries::get_user(conn, user_id)
        })?;
        let user = user.ok_or_else(|| AuthError::NotFound("User profile not found".to_string()))?;

        let is_current = self
            .identity
            .current()
            .map(|i| i.uid == user_id)
            .unwrap_or(false);
        if is_current {
            if let Err(e) = self.identity.update_display_name(&user.name).await {
                tracing::warn!(uid = user_id, error = %e, "failed to update display name");
            }
        }

        Ok(user)
    }

    /// Creates the demo administrator, or promotes its existing profile.
    pub async fn create_demo_admin(&self) -> Result<(), AuthError> {
        match self
            .identity
            .create_account(ADMIN_EMAIL, DEMO_ADMIN_PASSWORD)
            .await
        {
            Ok(identity) => {
                let admin = User {
                    id: identity.uid,
                    email: ADMIN_EMAIL.to_string(),
                    name: DEMO_ADMIN_NAME.to_string(),
                    phone: None,
                    created_at: Utc::now(),
                    email_verified: true,
                    role: Role::Admin,
                };
                self.with_db(|conn| queries::save_user(conn, &admin))?;
                self.identity.update_display_name(DEMO_ADMIN_NAME).await?;
                tracing::info!(uid = %admin.id, "demo admin account created");
                Ok(())
            }
            Err(ProviderError::EmailAlreadyInUse) => {
                let existing = self.with_db(|conn| queries::find_user_by_email(conn, ADMIN_EMAIL))?;
                match existing {
                    Some(mut admin) => {
                        admin.email_verified = true;
                        admin.role = Role::Admin;
                        self.with_db(|conn| queries::update_user(conn, &admin))?;
                        tracing::info!(uid = %admin.id, "existing demo admin promoted");
                    }
                    None => tracing::info!("demo admin account already exists"),
                }
                Ok(())
            }
            Err(e) => Err(AuthError::Remote(format!(
                "Failed to create demo admin account: {e}"
            ))),
        }
    }

    /// Delivers the current profile immediately, then once per identity change
    /// in the order the provider emits them. An identity without a profile is
    /// delivered as `None`.
    pub fn on_session_change<F>(&self, callback: F) -> SessionSubscription
    where
        F: Fn(Option<User>) + Send + 'static,
    {
        let mut rx = self.identity.subscribe();
        let identity = Arc::clone(&self.identity);
        let db = Arc::clone(&self.db);

        callback(profile_for(&db, identity.current().as_ref()));

        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(changed) => callback(profile_for(&db, changed.as_ref())),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "session listener lagged, resynchronising");
                        callback(profile_for(&db, identity.current().as_ref()));
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        SessionSubscription { task }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::db;
    use crate::services::identity::memory::{EmailKind, InMemoryIdentityProvider};

    fn setup() -> (AuthGateway, Arc<InMemoryIdentityProvider>, Arc<Mutex<Connection>>) {
        let provider = Arc::new(InMemoryIdentityProvider::new());
        let conn = Arc::new(Mutex::new(db::init_db(":memory:").unwrap()));
        let gateway = AuthGateway::new(provider.clone(), conn.clone());
        (gateway, provider, conn)
    }

    fn signup_request(email: &str) -> SignupRequest {
        SignupRequest {
            name: "Jane Doe".to_string(),
            email: email.to_string(),
            password: "secret1".to_string(),
            confirm_password: "secret1".to_string(),
            phone: Some("+15550001111".to_string()),
        }
    }

    #[tokio::test]
    async fn test_signup_creates_unverified_profile() {
        let (gateway, provider, conn) = setup();

        let user = gateway.signup(&signup_request("jane@example.com")).await.unwrap();
        assert!(!user.email_verified);
        assert_eq!(user.role, Role::User);

        let stored = queries::get_user(&conn.lock().unwrap(), &user.id).unwrap().unwrap();
        assert_eq!(stored.email, "jane@example.com");

        let sent = provider.sent_emails();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, EmailKind::Verification);
        assert_eq!(
            provider.current().and_then(|i| i.display_name),
            Some("Jane Doe".to_string())
        );
    }

    #[tokio::test]
    async fn test_signup_duplicate_by_precheck() {
        let (gateway, _, _) = setup();
        gateway.signup(&signup_request("jane@example.com")).await.unwrap();

        let err = gateway.signup(&signup_request("jane@example.com")).await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateAccount));
    }

    #[tokio::test]
    async fn test_signup_duplicate_by_provider() {
        let (gateway, provider, _) = setup();
        // Identity exists without a profile document, so the pre-check misses it.
        provider.create_account("jane@example.com", "secret1").await.unwrap();

        let err = gateway.signup(&signup_request("jane@example.com")).await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateAccount));
    }

    #[tokio::test]
    async fn test_signup_local_validation() {
        let (gateway, provider, _) = setup();

        let mut req = signup_request("jane@example.com");
        req.confirm_password = "different".to_string();
        let err = gateway.signup(&req).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidInput(_)));

        let mut req = signup_request("jane@example.com");
        req.name = "  ".to_string();
        assert!(matches!(gateway.signup(&req).await.unwrap_err(), AuthError::InvalidInput(_)));

        assert!(provider.account_by_email("jane@example.com").is_none());
    }

    #[tokio::test]
    async fn test_signup_weak_password() {
        let (gateway, _, _) = setup();
        let mut req = signup_request("jane@example.com");
        req.password = "123".to_string();
        req.confirm_password = "123".to_string();

        let err = gateway.signup(&req).await.unwrap_err();
        assert!(matches!(err, AuthError::WeakPassword));
    }

    #[tokio::test]
    async fn test_login_unverified_rejected() {
        let (gateway, _, _) = setup();
        gateway.signup(&signup_request("jane@example.com")).await.unwrap();
        gateway.logout().await;

        let err = gateway.login("jane@example.com", "secret1").await.unwrap_err();
        assert!(matches!(err, AuthError::UnverifiedEmail));
    }

    #[tokio::test]
    async fn test_login_verified_syncs_profile() {
        let (gateway, provider, _) = setup();
        gateway.signup(&signup_request("jane@example.com")).await.unwrap();
        gateway.logout().await;
        provider.mark_verified("jane@example.com");

        let user = gateway.login("jane@example.com", "secret1").await.unwrap();
        assert!(user.email_verified);
        assert!(gateway.profile(&user.id).unwrap().unwrap().email_verified);
    }

    #[tokio::test]
    async fn test_admin_login_bypasses_verification() {
        let (gateway, provider, conn) = setup();
        let identity = provider.create_account(ADMIN_EMAIL, "admin123").await.unwrap();
        queries::save_user(
            &conn.lock().unwrap(),
            &User {
                id: identity.uid,
                email: ADMIN_EMAIL.to_string(),
                name: "Admin User".to_string(),
                phone: None,
                created_at: Utc::now(),
                email_verified: false,
                role: Role::Admin,
            },
        )
        .unwrap();
        provider.sign_out().await.unwrap();

        let user = gateway.login(ADMIN_EMAIL, "admin123").await.unwrap();
        assert!(user.is_admin());
        assert!(!user.email_verified);
    }

    #[tokio::test]
    async fn test_login_error_mapping() {
        let (gateway, provider, _) = setup();
        gateway.signup(&signup_request("jane@example.com")).await.unwrap();
        gateway.logout().await;

        assert!(matches!(
            gateway.login("nobody@example.com", "secret1").await.unwrap_err(),
            AuthError::NotFound(_)
        ));
        assert!(matches!(
            gateway.login("jane@example.com", "wrong-password").await.unwrap_err(),
            AuthError::WrongCredentials
        ));
        assert!(matches!(
            gateway.login("", "").await.unwrap_err(),
            AuthError::InvalidInput(_)
        ));

        // Identity without a profile document.
        provider.create_account("ghost@example.com", "secret1").await.unwrap();
        assert!(matches!(
            gateway.login("ghost@example.com", "secret1").await.unwrap_err(),
            AuthError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_check_verification_status() {
        let (gateway, provider, _) = setup();
        let user = gateway.signup(&signup_request("jane@example.com")).await.unwrap();

        assert!(!gateway.check_verification_status(&user.id).await.unwrap());

        provider.mark_verified("jane@example.com");
        assert!(gateway.check_verification_status(&user.id).await.unwrap());
        assert!(gateway.profile(&user.id).unwrap().unwrap().email_verified);
    }

    #[tokio::test]
    async fn test_operations_require_session() {
        let (gateway, _, _) = setup();
        assert!(matches!(
            gateway.check_verification_status("u1").await.unwrap_err(),
            AuthError::NotLoggedIn
        ));
        assert!(matches!(
            gateway.resend_verification().await.unwrap_err(),
            AuthError::NotLoggedIn
        ));
    }

    #[tokio::test]
    async fn test_password_reset() {
        let (gateway, _, _) = setup();
        gateway.signup(&signup_request("jane@example.com")).await.unwrap();

        gateway.send_password_reset("jane@example.com").await.unwrap();
        assert!(matches!(
            gateway.send_password_reset("nobody@example.com").await.unwrap_err(),
            AuthError::NotFound(_)
        ));
        assert!(matches!(
            gateway.send_password_reset("bad-address").await.unwrap_err(),
            AuthError::InvalidInput(_)
        ));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let (gateway, _, _) = setup();
        let user = gateway.signup(&signup_request("jane@example.com")).await.unwrap();

        let updated = gateway
            .update_profile(
                &user.id,
                &ProfileUpdate {
                    name: "Jane Smith".to_string(),
                    phone: Some(" ".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Jane Smith");
        assert!(updated.phone.is_none());

        let err = gateway
            .update_profile(&user.id, &ProfileUpdate { name: "".to_string(), phone: None })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_create_demo_admin_twice() {
        let (gateway, _, conn) = setup();
        gateway.create_demo_admin().await.unwrap();
        gateway.create_demo_admin().await.unwrap();

        let admin = queries::find_user_by_email(&conn.lock().unwrap(), ADMIN_EMAIL)
            .unwrap()
            .unwrap();
        assert!(admin.is_admin());
        assert!(admin.email_verified);
    }

    #[tokio::test]
    async fn test_session_listener_delivers_changes_in_order() {
        let (gateway, provider, _) = setup();
        let user = gateway.signup(&signup_request("jane@example.com")).await.unwrap();
        provider.sign_out().await.unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let subscription = gateway.on_session_change(move |u| {
            let _ = tx.send(u.map(|u| u.id));
        });

        // Delivered once at subscription time.
        assert_eq!(rx.recv().await.unwrap(), None);

        provider.mark_verified("jane@example.com");
        gateway.login("jane@example.com", "secret1").await.unwrap();
        provider.expire_session();

        assert_eq!(rx.recv().await.unwrap(), Some(user.id.clone()));
        assert_eq!(rx.recv().await.unwrap(), None);
        assert!(subscription.is_active());
        subscription.unsubscribe();
    }

    #[tokio::test]
    async fn test_session_listener_stops_after_unsubscribe() {
        let (gateway, _, _) = setup();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let subscription = gateway.on_session_change(move |u| {
            let _ = tx.send(u);
        });
        assert_eq!(rx.recv().await.unwrap(), None);

        subscription.unsubscribe();
        gateway.signup(&signup_request("jane@example.com")).await.unwrap();

        // The sender lives in the aborted task, so the channel closes without events.
        let next = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_identity_without_profile_delivers_none() {
        let (gateway, provider, _) = setup();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _subscription = gateway.on_session_change(move |u| {
            let _ = tx.send(u);
        });
        assert_eq!(rx.recv().await.unwrap(), None);

        provider.create_account("ghost@example.com", "secret1").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), None);
    }
}
