use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::{AppointmentRequest, AppointmentStatus, Consultant};
use crate::services::validation;

/// Every slot the time picker shows, offered or not.
pub const CANONICAL_SLOTS: [&str; 8] = [
    "09:00", "10:00", "11:00", "12:00", "13:00", "14:00", "15:00", "16:00",
];

const QUICK_DATE_OFFSETS: [i64; 5] = [0, 1, 2, 3, 7];

#[derive(Debug, Clone, PartialEq)]
pub enum BookingError {
    NoConsultant,
    NoDate,
    NoTime,
    PastDate,
    SlotUnavailable { consultant: String, time: String },
    InvalidContact(FieldErrors),
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::NoConsultant => write!(f, "Please select a consultant"),
            BookingError::NoDate => write!(f, "Please select a date"),
            BookingError::NoTime => write!(f, "Please select a time"),
            BookingError::PastDate => write!(f, "Dates in the past cannot be booked"),
            BookingError::SlotUnavailable { consultant, time } => {
                write!(f, "{consultant} is not available at {time}")
            }
            BookingError::InvalidContact(_) => write!(f, "Please correct the contact details"),
        }
    }
}

impl std::error::Error for BookingError {}

/// What the three pickers currently hold.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Selection {
    pub consultant: Option<Consultant>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
}

impl Selection {
    pub fn select_consultant(&mut self, consultant: Consultant) {
        self.consultant = Some(consultant);
        self.date = None;
        self.time = None;
    }

    pub fn select_date(&mut self, date: NaiveDate, today: NaiveDate) -> Result<(), BookingError> {
        if date < today {
            return Err(BookingError::PastDate);
        }
        self.date = Some(date);
        self.time = None;
        Ok(())
    }

    pub fn select_time(&mut self, time: &str) -> Result<(), BookingError> {
        let consultant = self.consultant.as_ref().ok_or(BookingError::NoConsultant)?;
        if self.date.is_none() {
            return Err(BookingError::NoDate);
        }
        if !consultant.offers(time) {
            return Err(BookingError::SlotUnavailable {
                consultant: consultant.name.clone(),
                time: time.to_string(),
            });
        }
        self.time = Some(time.to_string());
        Ok(())
    }

    /// Keeps the consultant; used after a booking goes through.
    pub fn clear_slot(&mut self) {
        self.date = None;
        self.time = None;
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SlotView {
    pub time: String,
    pub available: bool,
    pub selected: bool,
}

/// Renders all canonical slots. Slots the consultant does not offer are
/// disabled rather than omitted.
pub fn time_slots(consultant: Option<&Consultant>, selected: Option<&str>) -> Vec<SlotView> {
    CANONICAL_SLOTS
        .iter()
        .map(|slot| SlotView {
            time: slot.to_string(),
            available: consultant.map(|c| c.offers(slot)).unwrap_or(false),
            selected: selected == Some(*slot),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuickDate {
    pub date: NaiveDate,
    pub label: String,
}

pub fn quick_dates(today: NaiveDate) -> Vec<QuickDate> {
    QUICK_DATE_OFFSETS
        .iter()
        .map(|&offset| {
            let date = today + Duration::days(offset);
            let label = match offset {
                0 => "Today".to_string(),
                1 => "Tomorrow".to_string(),
                _ => date.format("%a, %b %-d").to_string(),
            };
            QuickDate { date, label }
        })
        .collect()
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ContactForm {
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub client_email: String,
    #[serde(default)]
    pub client_phone: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct FieldErrors {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_phone: Option<String>,
}

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.client_name.is_none() && self.client_email.is_none() && self.client_phone.is_none()
    }
}

pub fn validate_contact(form: &ContactForm) -> Result<(), FieldErrors> {
    let errors = FieldErrors {
        client_name: validation::require(&form.client_name, "Name is required").err(),
        client_email: validation::validate_email(&form.client_email).err(),
        client_phone: validation::require(&form.client_phone, "Phone is required").err(),
    };
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks the selection and contact form, then hands a pending appointment to
/// `on_submit`. Nothing is called when any check fails.
pub fn submit<F, R>(
    selection: &Selection,
    form: &ContactForm,
    on_submit: F,
) -> Result<R, BookingError>
where
    F: FnOnce(AppointmentRequest) -> R,
{
    let consultant = selection.consultant.as_ref().ok_or(BookingError::NoConsultant)?;
    let date = selection.date.ok_or(BookingError::NoDate)?;
    let time = selection.time.clone().ok_or(BookingError::NoTime)?;
    validate_contact(form).map_err(BookingError::InvalidContact)?;

    let request = AppointmentRequest {
        consultant_id: consultant.id.clone(),
        consultant_name: consultant.name.clone(),
        date,
        time,
        client_name: form.client_name.clone(),
        client_email: form.client_email.clone(),
        client_phone: form.client_phone.clone(),
        notes: form.notes.clone().filter(|n| !n.trim().is_empty()),
        status: AppointmentStatus::Pending,
    };
    Ok(on_submit(request))
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::models::{find_reference_consultant, reference_consultants};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn full_selection() -> Selection {
        let mut selection = Selection::default();
        selection.select_consultant(find_reference_consultant("1").unwrap());
        selection.select_date(today(), today()).unwrap();
        selection.select_time("09:00").unwrap();
        selection
    }

    fn valid_form() -> ContactForm {
        ContactForm {
            client_name: "Jane Doe".to_string(),
            client_email: "jane@example.com".to_string(),
            client_phone: "+15550001111".to_string(),
            notes: None,
        }
    }

    #[test]
    fn test_consultant_change_clears_date_and_time() {
        let mut selection = full_selection();
        let b = find_reference_consultant("2").unwrap();
        selection.select_consultant(b.clone());

        assert_eq!(selection.consultant, Some(b));
        assert_eq!(selection.date, None);
        assert_eq!(selection.time, None);
    }

    #[test]
    fn test_date_change_clears_time() {
        let mut selection = full_selection();
        selection
            .select_date(today() + Duration::days(1), today())
            .unwrap();
        assert!(selection.time.is_none());
        assert!(selection.consultant.is_some());
    }

    #[test]
    fn test_past_date_refused() {
        let mut selection = Selection::default();
        let err = selection
            .select_date(today() - Duration::days(1), today())
            .unwrap_err();
        assert_eq!(err, BookingError::PastDate);
        assert!(selection.date.is_none());
    }

    #[test]
    fn test_select_time_checks() {
        let mut selection = Selection::default();
        assert_eq!(selection.select_time("09:00"), Err(BookingError::NoConsultant));

        // Michael Chen does not work at 09:00.
        selection.select_consultant(find_reference_consultant("2").unwrap());
        assert_eq!(selection.select_time("10:00"), Err(BookingError::NoDate));

        selection.select_date(today(), today()).unwrap();
        assert!(matches!(
            selection.select_time("09:00"),
            Err(BookingError::SlotUnavailable { .. })
        ));
        assert!(selection.select_time("10:00").is_ok());
        assert_eq!(selection.time.as_deref(), Some("10:00"));
    }

    #[test]
    fn test_slots_render_all_canonical_for_every_consultant() {
        for consultant in reference_consultants() {
            let slots = time_slots(Some(&consultant), None);
            assert_eq!(slots.len(), CANONICAL_SLOTS.len());
            for slot in &slots {
                assert_eq!(slot.available, consultant.available_hours.contains(&slot.time));
                assert!(!slot.selected);
            }
        }
    }

    #[test]
    fn test_slots_without_consultant_all_disabled() {
        let slots = time_slots(None, None);
        assert_eq!(slots.len(), 8);
        assert!(slots.iter().all(|s| !s.available));
    }

    #[test]
    fn test_slots_mark_selection() {
        let consultant = find_reference_consultant("1").unwrap();
        let slots = time_slots(Some(&consultant), Some("11:00"));
        let selected: Vec<_> = slots.iter().filter(|s| s.selected).collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].time, "11:00");
    }

    #[test]
    fn test_quick_dates() {
        let dates = quick_dates(today());
        let labels: Vec<_> = dates.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Today", "Tomorrow", "Wed, Mar 12", "Thu, Mar 13", "Mon, Mar 17"]
        );
        assert_eq!(dates[4].date, today() + Duration::days(7));
    }

    #[test]
    fn test_validate_contact() {
        assert!(validate_contact(&valid_form()).is_ok());

        let errors = validate_contact(&ContactForm {
            client_name: " ".to_string(),
            client_email: "jane@example".to_string(),
            client_phone: String::new(),
            notes: None,
        })
        .unwrap_err();
        assert!(errors.client_name.is_some());
        assert_eq!(errors.client_email.as_deref(), Some("Please enter a valid email"));
        assert!(errors.client_phone.is_some());
    }

    #[test]
    fn test_submit_rejects_invalid_forms_without_callback() {
        let mut bad_name = valid_form();
        bad_name.client_name = String::new();
        let mut bad_email = valid_form();
        bad_email.client_email = "not an email".to_string();
        let mut bad_phone = valid_form();
        bad_phone.client_phone = "   ".to_string();

        let calls = Cell::new(0);
        for form in [bad_name, bad_email, bad_phone] {
            let result = submit(&full_selection(), &form, |_| calls.set(calls.get() + 1));
            assert!(matches!(result, Err(BookingError::InvalidContact(_))));
        }
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_submit_requires_full_selection() {
        let calls = Cell::new(0);
        let mut selection = full_selection();
        selection.time = None;
        assert_eq!(
            submit(&selection, &valid_form(), |_| calls.set(calls.get() + 1)),
            Err(BookingError::NoTime)
        );
        assert_eq!(
            submit(&Selection::default(), &valid_form(), |_| calls.set(calls.get() + 1)),
            Err(BookingError::NoConsultant)
        );
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_submit_invokes_callback_once_with_pending() {
        let calls = Cell::new(0);
        let mut form = valid_form();
        form.notes = Some("  ".to_string());

        let request = submit(&full_selection(), &form, |req| {
            calls.set(calls.get() + 1);
            req
        })
        .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(request.status, AppointmentStatus::Pending);
        assert_eq!(request.consultant_name, "Dr. Sarah Johnson");
        assert_eq!(request.time, "09:00");
        assert!(request.notes.is_none());
    }
}
