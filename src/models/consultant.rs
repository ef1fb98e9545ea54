use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Consultant {
    pub id: String,
    pub name: String,
    pub specialty: String,
    pub experience: String,
    pub rating: f64,
    #[serde(default)]
    pub image: String,
    pub available_hours: Vec<String>,
}

impl Consultant {
    pub fn offers(&self, time: &str) -> bool {
        self.available_hours.iter().any(|h| h == time)
    }
}

fn consultant(
    id: &str,
    name: &str,
    specialty: &str,
    experience: &str,
    rating: f64,
    hours: &[&str],
) -> Consultant {
    Consultant {
        id: id.to_string(),
        name: name.to_string(),
        specialty: specialty.to_string(),
        experience: experience.to_string(),
        rating,
        image: String::new(),
        available_hours: hours.iter().map(|h| h.to_string()).collect(),
    }
}

/// The fixed consultant list offered by the booking flow.
pub fn reference_consultants() -> Vec<Consultant> {
    vec![
        consultant(
            "1",
            "Dr. Sarah Johnson",
            "Business Strategy",
            "15 years",
            4.8,
            &["09:00", "10:00", "11:00", "14:00", "15:00", "16:00"],
        ),
        consultant(
            "2",
            "Michael Chen",
            "Technology Consulting",
            "12 years",
            4.9,
            &["10:00", "11:00", "13:00", "14:00", "15:00", "16:00"],
        ),
        consultant(
            "3",
            "Dr. Emily Rodriguez",
            "Marketing & Branding",
            "10 years",
            4.7,
            &["09:00", "10:00", "11:00", "12:00", "14:00", "15:00"],
        ),
        consultant(
            "4",
            "James Wilson",
            "Financial Planning",
            "18 years",
            4.9,
            &["09:00", "10:00", "11:00", "13:00", "14:00", "15:00"],
        ),
    ]
}

pub fn find_reference_consultant(id: &str) -> Option<Consultant> {
    reference_consultants().into_iter().find(|c| c.id == id)
}
