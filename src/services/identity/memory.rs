use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use super::{AccountRecord, Identity, IdentityProvider, ProviderError};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
struct Account {
    uid: String,
    email: String,
    password: String,
    email_verified: bool,
    display_name: Option<String>,
    created_at: DateTime<Utc>,
    last_sign_in: Option<DateTime<Utc>>,
}

impl Account {
    fn identity(&self) -> Identity {
        Identity {
            uid: self.uid.clone(),
            email: self.email.clone(),
            email_verified: self.email_verified,
            display_name: self.display_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmailKind {
    Verification,
    PasswordReset,
}

/// An email the provider would have delivered.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SentEmail {
    pub kind: EmailKind,
    pub to: String,
}

/// Process-local identity provider used for offline development and tests.
pub struct InMemoryIdentityProvider {
    accounts: Mutex<HashMap<String, Account>>,
    current: Mutex<Option<String>>,
    outbox: Mutex<Vec<SentEmail>>,
    sign_out_fails: Mutex<bool>,
    events: broadcast::Sender<Option<Identity>>,
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            accounts: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
            outbox: Mutex::new(Vec::new()),
            sign_out_fails: Mutex::new(false),
            events,
        }
    }

    fn set_current(&self, uid: Option<String>) {
        let identity = uid.as_ref().and_then(|uid| {
            self.accounts
                .lock()
                .unwrap()
                .get(uid)
                .map(Account::identity)
        });
        *self.current.lock().unwrap() = uid;
        let _ = self.events.send(identity);
    }

    fn current_uid(&self) -> Result<String, ProviderError> {
        self.current
            .lock()
            .unwrap()
            .clone()
            .ok_or(ProviderError::NoCurrentUser)
    }

    fn record_email(&self, kind: EmailKind, to: &str) {
        tracing::info!(to, ?kind, "email queued");
        self.outbox.lock().unwrap().push(SentEmail {
            kind,
            to: to.to_string(),
        });
    }

    pub fn account_by_email(&self, email: &str) -> Option<Identity> {
        self.accounts
            .lock()
            .unwrap()
            .values()
            .find(|a| a.email == email)
            .map(Account::identity)
    }

    /// Removes the account; a signed-in session for it ends.
    pub fn delete_account(&self, uid: &str) -> bool {
        let removed = self.accounts.lock().unwrap().remove(uid).is_some();
        let was_current = self.current.lock().unwrap().as_deref() == Some(uid);
        if removed && was_current {
            self.set_current(None);
        }
        removed
    }

    pub fn list_accounts(&self, limit: usize) -> Vec<AccountRecord> {
        let mut accounts: Vec<Account> = self.accounts.lock().unwrap().values().cloned().collect();
        accounts.sort_by_key(|a| a.created_at);
        accounts
            .into_iter()
            .take(limit)
            .map(|a| AccountRecord {
                uid: a.uid,
                email: Some(a.email),
                display_name: a.display_name,
                email_verified: a.email_verified,
                disabled: false,
                created_at: Some(a.created_at.to_rfc2822()),
                last_sign_in: a.last_sign_in.map(|t| t.to_rfc2822()),
            })
            .collect()
    }

    /// Flips the verification flag, as following the emailed link would.
    pub fn mark_verified(&self, email: &str) -> bool {
        let mut accounts = self.accounts.lock().unwrap();
        match accounts.values_mut().find(|a| a.email == email) {
            Some(account) => {
                account.email_verified = true;
                true
            }
            None => false,
        }
    }

    /// Ends the current session as an expired token would.
    pub fn expire_session(&self) {
        self.set_current(None);
    }

    /// Makes `sign_out` report the provider as unreachable, keeping the session.
    pub fn fail_sign_out(&self, fail: bool) {
        *self.sign_out_fails.lock().unwrap() = fail;
    }

    pub fn sent_emails(&self) -> Vec<SentEmail> {
        self.outbox.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, ProviderError> {
        if !email.contains('@') {
            return Err(ProviderError::InvalidEmail);
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(ProviderError::WeakPassword);
        }

        let uid = {
            let mut accounts = self.accounts.lock().unwrap();
            if accounts.values().any(|a| a.email == email) {
                return Err(ProviderError::EmailAlreadyInUse);
            }
            let uid = uuid::Uuid::new_v4().simple().to_string();
            let now = Utc::now();
            accounts.insert(
                uid.clone(),
                Account {
                    uid: uid.clone(),
                    email: email.to_string(),
                    password: password.to_string(),
                    email_verified: false,
                    display_name: None,
                    created_at: now,
                    last_sign_in: Some(now),
                },
            );
            uid
        };

        self.set_current(Some(uid));
        self.current().ok_or(ProviderError::NoCurrentUser)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, ProviderError> {
        if !email.contains('@') {
            return Err(ProviderError::InvalidEmail);
        }

        let uid = {
            let mut accounts = self.accounts.lock().unwrap();
            let account = accounts
                .values_mut()
                .find(|a| a.email == email)
                .ok_or(ProviderError::UserNotFound)?;
            if account.password != password {
                return Err(ProviderError::WrongPassword);
            }
            account.last_sign_in = Some(Utc::now());
            account.uid.clone()
        };

        self.set_current(Some(uid));
        self.current().ok_or(ProviderError::NoCurrentUser)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        if *self.sign_out_fails.lock().unwrap() {
            return Err(ProviderError::Unavailable("sign-out failed".to_string()));
        }
        self.set_current(None);
        Ok(())
    }

    fn current(&self) -> Option<Identity> {
        let uid = self.current.lock().unwrap().clone()?;
        self.accounts
            .lock()
            .unwrap()
            .get(&uid)
            .map(Account::identity)
    }

    async fn reload(&self) -> Result<Identity, ProviderError> {
        self.current_uid()?;
        match self.current() {
            Some(identity) => Ok(identity),
            None => {
                // The account vanished underneath the session.
                self.set_current(None);
                Err(ProviderError::UserNotFound)
            }
        }
    }

    async fn send_verification_email(&self) -> Result<(), ProviderError> {
        let identity = self.current().ok_or(ProviderError::NoCurrentUser)?;
        self.record_email(EmailKind::Verification, &identity.email);
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), ProviderError> {
        if !email.contains('@') {
            return Err(ProviderError::InvalidEmail);
        }
        if self.account_by_email(email).is_none() {
            return Err(ProviderError::UserNotFound);
        }
        self.record_email(EmailKind::PasswordReset, email);
        Ok(())
    }

    async fn update_display_name(&self, name: &str) -> Result<(), ProviderError> {
        let uid = self.current_uid()?;
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts.get_mut(&uid).ok_or(ProviderError::UserNotFound)?;
        account.display_name = Some(name.to_string());
        Ok(())
    }

    async fn id_token(&self) -> Result<String, ProviderError> {
        let uid = self.current_uid()?;
        Ok(format!("local.{uid}"))
    }

    fn subscribe(&self) -> broadcast::Receiver<Option<Identity>> {
        self.events.subscribe()
    }
}
