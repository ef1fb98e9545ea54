use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{Appointment, AppointmentStatus, Consultant, Role, User};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn conversion_error(column: usize, e: chrono::ParseError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
}

// ── Users ──

const USER_COLUMNS: &str = "id, email, name, phone, created_at, email_verified, role";

fn parse_user_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
    let created_at_str: String = row.get(4)?;
    let role_str: String = row.get(6)?;

    let created_at = NaiveDateTime::parse_from_str(&created_at_str, TIMESTAMP_FORMAT)
        .map(|dt| dt.and_utc())
        .map_err(|e| conversion_error(4, e))?;

    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        phone: row.get(3)?,
        created_at,
        email_verified: row.get(5)?,
        role: Role::parse(&role_str),
    })
}

pub fn get_user(conn: &Connection, id: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id],
        parse_user_row,
    )
    .optional()
}

pub fn find_user_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1 LIMIT 1"),
        params![email],
        parse_user_row,
    )
    .optional()
}

pub fn list_users(conn: &Connection) -> rusqlite::Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"
    ))?;
    let rows = stmt.query_map([], parse_user_row)?;
    rows.collect()
}

/// Creates or fully replaces a profile document.
pub fn save_user(conn: &Connection, user: &User) -> rusqlite::Result<()> {
    let created_at = user.created_at.format(TIMESTAMP_FORMAT).to_string();
    conn.execute(
        "INSERT INTO users (id, email, name, phone, created_at, email_verified, role)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
           email = excluded.email,
           name = excluded.name,
           phone = excluded.phone,
           created_at = excluded.created_at,
           email_verified = excluded.email_verified,
           role = excluded.role",
        params![
            user.id,
            user.email,
            user.name,
            user.phone,
            created_at,
            user.email_verified,
            user.role.as_str(),
        ],
    )?;
    Ok(())
}

/// Writes every field except the id and creation time back to an existing profile.
pub fn update_user(conn: &Connection, user: &User) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE users SET email = ?1, name = ?2, phone = ?3, email_verified = ?4, role = ?5
         WHERE id = ?6",
        params![
            user.email,
            user.name,
            user.phone,
            user.email_verified,
            user.role.as_str(),
            user.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn update_user_profile(
    conn: &Connection,
    id: &str,
    name: &str,
    phone: Option<&str>,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE users SET name = ?1, phone = ?2 WHERE id = ?3",
        params![name, phone, id],
    )?;
    Ok(count > 0)
}

pub fn set_email_verified(conn: &Connection, id: &str, verified: bool) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE users SET email_verified = ?1 WHERE id = ?2",
        params![verified, id],
    )?;
    Ok(count > 0)
}

pub fn delete_user(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    let count = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

// ── Consultants ──

fn parse_consultant_row(row: &rusqlite::Row) -> rusqlite::Result<Consultant> {
    let hours_json: String = row.get(6)?;
    Ok(Consultant {
        id: row.get(0)?,
        name: row.get(1)?,
        specialty: row.get(2)?,
        experience: row.get(3)?,
        rating: row.get(4)?,
        image: row.get(5)?,
        available_hours: serde_json::from_str(&hours_json).unwrap_or_default(),
    })
}

pub fn list_consultants(conn: &Connection) -> rusqlite::Result<Vec<Consultant>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, specialty, experience, rating, image, available_hours
         FROM consultants ORDER BY id ASC",
    )?;
    let rows = stmt.query_map([], parse_consultant_row)?;
    rows.collect()
}

pub fn update_consultant(conn: &Connection, consultant: &Consultant) -> rusqlite::Result<bool> {
    let hours = serde_json::to_string(&consultant.available_hours)
        .unwrap_or_else(|_| "[]".to_string());
    let count = conn.execute(
        "UPDATE consultants SET name = ?1, specialty = ?2, experience = ?3, rating = ?4, image = ?5, available_hours = ?6
         WHERE id = ?7",
        params![
            consultant.name,
            consultant.specialty,
            consultant.experience,
            consultant.rating,
            consultant.image,
            hours,
            consultant.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_consultant(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    let count = conn.execute("DELETE FROM consultants WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

// ── Appointments ──

fn parse_appointment_row(row: &rusqlite::Row) -> rusqlite::Result<Appointment> {
    let date_str: String = row.get(3)?;
    let status_str: String = row.get(9)?;

    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
        .map_err(|e| conversion_error(3, e))?;

    Ok(Appointment {
        id: row.get(0)?,
        consultant_id: row.get(1)?,
        consultant_name: row.get(2)?,
        date,
        time: row.get(4)?,
        client_name: row.get(5)?,
        client_email: row.get(6)?,
        client_phone: row.get(7)?,
        notes: row.get(8)?,
        status: AppointmentStatus::parse(&status_str),
    })
}

pub fn list_appointments(conn: &Connection) -> rusqlite::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(
        "SELECT id, consultant_id, consultant_name, date, time, client_name, client_email, client_phone, notes, status
         FROM appointments ORDER BY date ASC, time ASC",
    )?;
    let rows = stmt.query_map([], parse_appointment_row)?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::db;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn make_user(id: &str, email: &str) -> User {
        User {
            id: id.to_string(),
            email: email.to_string(),
            name: "Jane Doe".to_string(),
            phone: Some("+15550001111".to_string()),
            created_at: Utc::now(),
            email_verified: false,
            role: Role::User,
        }
    }

    #[test]
    fn test_save_and_get_user() {
        let conn = setup_db();
        save_user(&conn, &make_user("u1", "jane@example.com")).unwrap();

        let loaded = get_user(&conn, "u1").unwrap().unwrap();
        assert_eq!(loaded.email, "jane@example.com");
        assert_eq!(loaded.phone.as_deref(), Some("+15550001111"));
        assert!(!loaded.email_verified);
        assert_eq!(loaded.role, Role::User);

        assert!(get_user(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_find_user_by_email() {
        let conn = setup_db();
        save_user(&conn, &make_user("u1", "jane@example.com")).unwrap();

        let found = find_user_by_email(&conn, "jane@example.com").unwrap();
        assert_eq!(found.map(|u| u.id), Some("u1".to_string()));
        assert!(find_user_by_email(&conn, "nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn test_save_user_replaces_document() {
        let conn = setup_db();
        let mut user = make_user("u1", "jane@example.com");
        save_user(&conn, &user).unwrap();

        user.role = Role::Admin;
        user.email_verified = true;
        save_user(&conn, &user).unwrap();

        let loaded = get_user(&conn, "u1").unwrap().unwrap();
        assert!(loaded.is_admin());
        assert!(loaded.email_verified);
        assert_eq!(list_users(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_set_email_verified() {
        let conn = setup_db();
        save_user(&conn, &make_user("u1", "jane@example.com")).unwrap();

        assert!(set_email_verified(&conn, "u1", true).unwrap());
        assert!(get_user(&conn, "u1").unwrap().unwrap().email_verified);
        assert!(!set_email_verified(&conn, "missing", true).unwrap());
    }

    #[test]
    fn test_update_and_delete_user() {
        let conn = setup_db();
        let mut user = make_user("u1", "jane@example.com");
        save_user(&conn, &user).unwrap();

        user.name = "Jane Smith".to_string();
        assert!(update_user(&conn, &user).unwrap());
        assert!(update_user_profile(&conn, "u1", "J. Smith", None).unwrap());

        let loaded = get_user(&conn, "u1").unwrap().unwrap();
        assert_eq!(loaded.name, "J. Smith");
        assert!(loaded.phone.is_none());

        assert!(delete_user(&conn, "u1").unwrap());
        assert!(!delete_user(&conn, "u1").unwrap());
    }

    #[test]
    fn test_consultants_seeded_and_editable() {
        let conn = setup_db();
        let mut consultants = list_consultants(&conn).unwrap();
        assert_eq!(consultants.len(), 4);
        assert_eq!(consultants[0].name, "Dr. Sarah Johnson");
        assert!(consultants[0].offers("09:00"));

        let first = &mut consultants[0];
        first.available_hours = vec!["12:00".to_string()];
        first.rating = 5.0;
        assert!(update_consultant(&conn, first).unwrap());

        let reloaded = list_consultants(&conn).unwrap();
        assert_eq!(reloaded[0].available_hours, vec!["12:00".to_string()]);
        assert_eq!(reloaded[0].rating, 5.0);

        assert!(delete_consultant(&conn, "1").unwrap());
        assert_eq!(list_consultants(&conn).unwrap().len(), 3);
    }

    #[test]
    fn test_corrupt_created_at_is_an_error() {
        let conn = setup_db();
        conn.execute(
            "INSERT INTO users (id, email, name, created_at) VALUES ('u1', 'jane@example.com', 'Jane', 'yesterday')",
            [],
        )
        .unwrap();

        assert!(matches!(
            get_user(&conn, "u1"),
            Err(rusqlite::Error::FromSqlConversionFailure(4, _, _))
        ));
        assert!(list_users(&conn).is_err());
    }

    #[test]
    fn test_list_appointments() {
        let conn = setup_db();
        conn.execute(
            "INSERT INTO appointments (id, consultant_id, consultant_name, date, time, client_name, client_email, client_phone, notes, status)
             VALUES ('a1', '2', 'Michael Chen', '2025-06-16', '10:00', 'Alice', 'alice@example.com', '+15551110000', NULL, 'confirmed')",
            [],
        )
        .unwrap();

        let appointments = list_appointments(&conn).unwrap();
        assert_eq!(appointments.len(), 1);
        assert_eq!(appointments[0].status, AppointmentStatus::Confirmed);
        assert_eq!(
            appointments[0].date,
            NaiveDate::from_ymd_opt(2025, 6, 16).unwrap()
        );
    }
}
