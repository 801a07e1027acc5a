//! Issued course certificates. A row only changes inside the transaction
//! that issues it, to point its URL at the row id.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Certificate {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,
    pub certificate_number: String,
    pub certificate_url: String,
    pub issued_at: String,
}

/// Certificate with the title of its course, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateListing {
    #[serde(flatten)]
    pub certificate: Certificate,
    pub course_title: String,
}

const COLUMNS: &str = "c.id, c.user_id, c.course_id, c.certificate_number, c.certificate_url, c.issued_at";

fn parse_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Certificate> {
    Ok(Certificate {
        id: row.get(0)?,
        user_id: row.get(1)?,
        course_id: row.get(2)?,
        certificate_number: row.get(3)?,
        certificate_url: row.get(4)?,
        issued_at: row.get(5)?,
    })
}

pub fn get_certificate(conn: &Connection, user_id: i64, course_id: i64) -> rusqlite::Result<Option<Certificate>> {
    conn.query_row(
        &format!("SELECT {} FROM certificates c WHERE c.user_id = ?1 AND c.course_id = ?2", COLUMNS),
        params![user_id, course_id],
        parse_row,
    )
    .optional()
}

/// Certificate `certificate_id`, but only when it belongs to `user_id`.
pub fn get_owned_certificate(
    conn: &Connection,
    user_id: i64,
    certificate_id: i64,
) -> rusqlite::Result<Option<Certificate>> {
    conn.query_row(
        &format!("SELECT {} FROM certificates c WHERE c.id = ?1 AND c.user_id = ?2", COLUMNS),
        params![certificate_id, user_id],
        parse_row,
    )
    .optional()
}

/// Insert unless a certificate for the pair already exists.
/// Returns `false` when another writer got there first.
pub fn insert_certificate(
    conn: &Connection,
    user_id: i64,
    course_id: i64,
    number: &str,
    url: &str,
    at: &str,
) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO certificates (user_id, course_id, certificate_number, certificate_url, issued_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT DO NOTHING",
        params![user_id, course_id, number, url, at],
    )?;
    Ok(inserted == 1)
}

pub fn set_certificate_url(conn: &Connection, certificate_id: i64, url: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE certificates SET certificate_url = ?1 WHERE id = ?2",
        params![url, certificate_id],
    )?;
    Ok(())
}

pub fn list_user_certificates(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<CertificateListing>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {}, co.title FROM certificates c
         JOIN courses co ON co.id = c.course_id
         WHERE c.user_id = ?1
         ORDER BY c.issued_at DESC, c.id DESC",
        COLUMNS
    ))?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok(CertificateListing {
            certificate: parse_row(row)?,
            course_title: row.get(6)?,
        })
    })?;
    rows.collect()
}
