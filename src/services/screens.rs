use serde::{Deserialize, Serialize};

use crate::session::SessionSnapshot;

/// Which auxiliary screen the user asked for.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NavFlags {
    #[serde(default)]
    pub show_signup: bool,
    #[serde(default)]
    pub show_password_reset: bool,
    #[serde(default)]
    pub show_profile: bool,
    #[serde(default)]
    pub show_admin_dashboard: bool,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum Screen {
    Login,
    Signup,
    PasswordReset,
    VerifyEmail,
    Booking {
        profile_open: bool,
        admin_dashboard_open: bool,
    },
}

/// Strict precedence: anonymous screens, then the verification gate, then
/// the booking layout with its overlays.
pub fn resolve(session: &SessionSnapshot, nav: &NavFlags) -> Screen {
    let user = match (&session.user, session.is_authenticated) {
        (Some(user), true) => user,
        _ => {
            return if nav.show_password_reset {
                Screen::PasswordReset
            } else if nav.show_signup {
                Screen::Signup
            } else {
                Screen::Login
            };
        }
    };

    if user.needs_verification() {
        return Screen::VerifyEmail;
    }

    Screen::Booking {
        profile_open: nav.show_profile,
        admin_dashboard_open: nav.show_admin_dashboard && user.is_admin(),
    }
}
