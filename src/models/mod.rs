pub mod appointment;
pub mod consultant;
pub mod user;

pub use appointment::{Appointment, AppointmentRequest, AppointmentStatus};
pub use consultant::{find_reference_consultant, reference_consultants, Consultant};
pub use user::{Role, User, ADMIN_EMAIL};
