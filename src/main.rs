use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

use consultbook::config::{AppConfig, IdentityBackend};
use consultbook::db;
use consultbook::handlers;
use consultbook::services::auth::AuthGateway;
use consultbook::services::functions::{AdminFunctions, CallableFunctions, LocalFunctions};
use consultbook::services::identity::firebase::FirebaseIdentityProvider;
use consultbook::services::identity::memory::InMemoryIdentityProvider;
use consultbook::services::identity::IdentityProvider;
use consultbook::session::{SessionAction, SessionStore};
use consultbook::state::AppState;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for ctrl-c, running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let db = Arc::new(Mutex::new(db::init_db(&config.database_url)?));

    let (identity, functions): (Arc<dyn IdentityProvider>, Box<dyn AdminFunctions>) =
        match config.identity_backend {
            IdentityBackend::Firebase => {
                anyhow::ensure!(
                    !config.firebase_api_key.is_empty(),
                    "FIREBASE_API_KEY must be set when IDENTITY_PROVIDER=firebase"
                );
                anyhow::ensure!(
                    !config.functions_url.is_empty(),
                    "FUNCTIONS_URL must be set when IDENTITY_PROVIDER=firebase"
                );
                tracing::info!(auth_url = %config.firebase_auth_url, "using Firebase identity provider");
                let provider: Arc<dyn IdentityProvider> = Arc::new(FirebaseIdentityProvider::new(
                    config.firebase_api_key.clone(),
                    config.firebase_auth_url.clone(),
                    config.firebase_token_url.clone(),
                ));
                let functions: Box<dyn AdminFunctions> = Box::new(CallableFunctions::new(
                    config.functions_url.clone(),
                    Arc::clone(&provider),
                ));
                (provider, functions)
            }
            IdentityBackend::Memory => {
                tracing::info!("using in-memory identity provider");
                let provider = Arc::new(InMemoryIdentityProvider::new());
                let functions: Box<dyn AdminFunctions> =
                    Box::new(LocalFunctions::new(Arc::clone(&provider), Arc::clone(&db)));
                (provider as Arc<dyn IdentityProvider>, functions)
            }
        };

    let session = Arc::new(SessionStore::new());
    let auth = AuthGateway::new(identity, Arc::clone(&db));

    let listener_session = Arc::clone(&session);
    let subscription = auth.on_session_change(move |user| {
        listener_session.dispatch(SessionAction::ExternalChange(user));
    });

    let state = Arc::new(AppState::new(db, config.clone(), session, auth, functions));
    let app = handlers::app(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    subscription.unsubscribe();
    Ok(())
}
