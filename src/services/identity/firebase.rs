use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use super::{Identity, IdentityProvider, ProviderError};

#[derive(Debug, Clone)]
struct Tokens {
    id_token: String,
    refresh_token: String,
}

#[derive(Debug, Clone)]
struct SignedIn {
    identity: Identity,
    tokens: Tokens,
}

/// Identity Toolkit REST client (Firebase Authentication).
pub struct FirebaseIdentityProvider {
    api_key: String,
    auth_url: String,
    token_url: String,
    client: reqwest::Client,
    session: Mutex<Option<SignedIn>>,
    events: broadcast::Sender<Option<Identity>>,
}

impl FirebaseIdentityProvider {
    pub fn new(api_key: String, auth_url: String, token_url: String) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            api_key,
            auth_url: auth_url.trim_end_matches('/').to_string(),
            token_url: token_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            session: Mutex::new(None),
            events,
        }
    }

    fn tokens(&self) -> Result<Tokens, ProviderError> {
        self.session
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.tokens.clone())
            .ok_or(ProviderError::NoCurrentUser)
    }

    fn set_session(&self, signed_in: Option<SignedIn>) {
        let identity = signed_in.as_ref().map(|s| s.identity.clone());
        *self.session.lock().unwrap() = signed_in;
        // No receivers is fine: nobody is listening yet.
        let _ = self.events.send(identity);
    }

    async fn post(&self, url: String, body: &Value) -> Result<Value, ProviderError> {
        let resp = self
            .client
            .post(&url)
            .query(&[("key", &self.api_key)])
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let status = resp.status();
        let data: Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("unreadable response: {e}")))?;

        if !status.is_success() {
            return Err(match data["error"]["message"].as_str() {
                Some(message) => ProviderError::from_code(message),
                None => ProviderError::Rejected(format!("HTTP {status}")),
            });
        }

        Ok(data)
    }

    async fn accounts(&self, method: &str, body: Value) -> Result<Value, ProviderError> {
        self.post(format!("{}/v1/accounts:{method}", self.auth_url), &body)
            .await
    }

    async fn lookup(&self, id_token: &str) -> Result<Identity, ProviderError> {
        let data = self.accounts("lookup", json!({ "idToken": id_token })).await?;
        let user = &data["users"][0];
        let uid = user["localId"]
            .as_str()
            .ok_or(ProviderError::UserNotFound)?
            .to_string();

        Ok(Identity {
            uid,
            email: user["email"].as_str().unwrap_or_default().to_string(),
            email_verified: user["emailVerified"].as_bool().unwrap_or(false),
            display_name: user["displayName"].as_str().map(str::to_string),
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Tokens, ProviderError> {
        let resp = self
            .client
            .post(format!("{}/v1/token", self.token_url))
            .query(&[("key", &self.api_key)])
            .form(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)])
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let status = resp.status();
        let data: Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("unreadable response: {e}")))?;

        if !status.is_success() {
            return Err(match data["error"]["message"].as_str() {
                Some(message) => ProviderError::from_code(message),
                None => ProviderError::TokenExpired,
            });
        }

        match (data["id_token"].as_str(), data["refresh_token"].as_str()) {
            (Some(id_token), Some(refresh_token)) => Ok(Tokens {
                id_token: id_token.to_string(),
                refresh_token: refresh_token.to_string(),
            }),
            _ => Err(ProviderError::Rejected("token response missing tokens".to_string())),
        }
    }

    /// Turns a signUp/signInWithPassword response into the signed-in session.
    async fn establish(&self, data: Value) -> Result<Identity, ProviderError> {
        let tokens = match (data["idToken"].as_str(), data["refreshToken"].as_str()) {
            (Some(id_token), Some(refresh_token)) => Tokens {
                id_token: id_token.to_string(),
                refresh_token: refresh_token.to_string(),
            },
            _ => return Err(ProviderError::Rejected("response missing tokens".to_string())),
        };

        let identity = self.lookup(&tokens.id_token).await?;
        self.set_session(Some(SignedIn {
            identity: identity.clone(),
            tokens,
        }));
        Ok(identity)
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentityProvider {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, ProviderError> {
        let data = self
            .accounts(
                "signUp",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        self.establish(data).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, ProviderError> {
        let data = self
            .accounts(
                "signInWithPassword",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        self.establish(data).await
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        // The REST API keeps no server-side session; dropping the tokens is the sign-out.
        self.set_session(None);
        Ok(())
    }

    fn current(&self) -> Option<Identity> {
        self.session
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.identity.clone())
    }

    async fn reload(&self) -> Result<Identity, ProviderError> {
        let mut tokens = self.tokens()?;

        let identity = match self.lookup(&tokens.id_token).await {
            Err(ProviderError::TokenExpired) => match self.refresh(&tokens.refresh_token).await {
                Ok(fresh) => {
                    tokens = fresh;
                    self.lookup(&tokens.id_token).await?
                }
                Err(e) => {
                    tracing::info!(error = %e, "session refresh failed, signing out");
                    self.set_session(None);
                    return Err(ProviderError::TokenExpired);
                }
            },
            other => other?,
        };

        *self.session.lock().unwrap() = Some(SignedIn {
            identity: identity.clone(),
            tokens,
        });
        Ok(identity)
    }

    async fn send_verification_email(&self) -> Result<(), ProviderError> {
        let tokens = self.tokens()?;
        self.accounts(
            "sendOobCode",
            json!({ "requestType": "VERIFY_EMAIL", "idToken": tokens.id_token }),
        )
        .await?;
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), ProviderError> {
        self.accounts(
            "sendOobCode",
            json!({ "requestType": "PASSWORD_RESET", "email": email }),
        )
        .await?;
        Ok(())
    }

    async fn update_display_name(&self, name: &str) -> Result<(), ProviderError> {
        let tokens = self.tokens()?;
        self.accounts(
            "update",
            json!({ "idToken": tokens.id_token, "displayName": name, "returnSecureToken": false }),
        )
        .await?;

        if let Some(signed_in) = self.session.lock().unwrap().as_mut() {
            signed_in.identity.display_name = Some(name.to_string());
        }
        Ok(())
    }

    async fn id_token(&self) -> Result<String, ProviderError> {
        let tokens = self.tokens()?;
        let fresh = self.refresh(&tokens.refresh_token).await?;

        if let Some(signed_in) = self.session.lock().unwrap().as_mut() {
            signed_in.tokens = fresh.clone();
        }
        Ok(fresh.id_token)
    }

    fn subscribe(&self) -> broadcast::Receiver<Option<Identity>> {
        self.events.subscribe()
    }
}
