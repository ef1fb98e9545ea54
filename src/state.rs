use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::models::Appointment;
use crate::services::admin::Dashboard;
use crate::services::auth::AuthGateway;
use crate::services::booking::Selection;
use crate::services::functions::AdminFunctions;
use crate::services::screens::NavFlags;
use crate::session::SessionStore;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub session: Arc<SessionStore>,
    pub auth: AuthGateway,
    pub functions: Box<dyn AdminFunctions>,
    pub nav: Mutex<NavFlags>,
    pub selection: Mutex<Selection>,
    /// Appointments booked in this process. Never written to the store.
    pub appointments: Mutex<Vec<Appointment>>,
    pub dashboard: Mutex<Dashboard>,
}

impl AppState {
    pub fn new(
        db: Arc<Mutex<Connection>>,
        config: AppConfig,
        session: Arc<SessionStore>,
        auth: AuthGateway,
        functions: Box<dyn AdminFunctions>,
    ) -> Self {
        Self {
            db,
            config,
            session,
            auth,
            functions,
            nav: Mutex::new(NavFlags::default()),
            selection: Mutex::new(Selection::default()),
            appointments: Mutex::new(Vec::new()),
            dashboard: Mutex::new(Dashboard::default()),
        }
    }
}
