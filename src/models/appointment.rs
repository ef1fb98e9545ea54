use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: String,
    pub consultant_id: String,
    pub consultant_name: String,
    pub date: NaiveDate,
    pub time: String,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: String,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
}

/// An appointment as produced by the booking form, before an id is assigned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentRequest {
    pub consultant_id: String,
    pub consultant_name: String,
    pub date: NaiveDate,
    pub time: String,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: String,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
}

impl AppointmentRequest {
    pub fn with_id(self, id: String) -> Appointment {
        Appointment {
            id,
            consultant_id: self.consultant_id,
            consultant_name: self.consultant_name,
            date: self.date,
            time: self.time,
            client_name: self.client_name,
            client_email: self.client_email,
            client_phone: self.client_phone,
            notes: self.notes,
            status: self.status,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "confirmed" => AppointmentStatus::Confirmed,
            "cancelled" => AppointmentStatus::Cancelled,
            _ => AppointmentStatus::Pending,
        }
    }
}
