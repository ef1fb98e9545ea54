use std::env;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdentityBackend {
    /// Accounts held in process memory, for offline development.
    Memory,
    Firebase,
}

impl IdentityBackend {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "firebase" => IdentityBackend::Firebase,
            _ => IdentityBackend::Memory,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub identity_backend: IdentityBackend,
    pub firebase_api_key: String,
    pub firebase_auth_url: String,
    pub firebase_token_url: String,
    pub functions_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "consultbook.db".to_string()),
            identity_backend: IdentityBackend::parse(
                &env::var("IDENTITY_PROVIDER").unwrap_or_default(),
            ),
            firebase_api_key: env::var("FIREBASE_API_KEY").unwrap_or_default(),
            firebase_auth_url: env::var("FIREBASE_AUTH_URL")
                .unwrap_or_else(|_| "https://identitytoolkit.googleapis.com".to_string()),
            firebase_token_url: env::var("FIREBASE_TOKEN_URL")
                .unwrap_or_else(|_| "https://securetoken.googleapis.com".to_string()),
            functions_url: env::var("FUNCTIONS_URL").unwrap_or_default(),
        }
    }
}
