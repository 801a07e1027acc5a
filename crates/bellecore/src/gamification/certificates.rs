//! Certificate issuer.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::PathBuf;

use super::CascadeSettings;
use crate::core::error::{AppError, AppResult};
use crate::render::{CertificateContent, CertificateRenderer};
use crate::storage::certificates::{self as store, Certificate, CertificateListing};
use crate::storage::{self, catalog, users};

/// `CERT-{user:05}-{course:03}-{YYYYMMDD}`
pub fn certificate_number(user_id: i64, course_id: i64, now: DateTime<Utc>) -> String {
    format!("CERT-{:05}-{:03}-{}", user_id, course_id, now.format("%Y%m%d"))
}

pub fn file_name(certificate_number: &str) -> String {
    format!("{}.pdf", certificate_number)
}

/// Download link for a certificate. Relative when no base URL is configured.
pub fn certificate_url(public_base_url: Option<&str>, certificate_id: i64) -> String {
    let path = format!("/api/certificates/{}/download", certificate_id);
    match public_base_url {
        Some(base) => format!("{}{}", base.trim_end_matches('/'), path),
        None => path,
    }
}

/// Where the rendered PDF of `certificate` lives.
pub fn file_path(settings: &CascadeSettings, certificate: &Certificate) -> PathBuf {
    settings.certificate_dir.join(file_name(&certificate.certificate_number))
}

/// Return the user's certificate for a course, issuing and rendering it on
/// first call.
///
/// Writes the PDF as part of the call, so run it outside a transaction. The
/// cascade uses [`issue_record`] in its transaction and [`ensure_file`] after
/// commit instead.
pub fn issue_if_absent(
    conn: &Connection,
    renderer: &dyn CertificateRenderer,
    settings: &CascadeSettings,
    user_id: i64,
    course_id: i64,
    now: DateTime<Utc>,
) -> AppResult<Certificate> {
    let certificate = issue_record(conn, settings, user_id, course_id, now)?;
    ensure_file(conn, renderer, settings, &certificate)?;
    Ok(certificate)
}

/// Database half of [`issue_if_absent`]: returns the existing row or inserts
/// one, without touching the filesystem.
///
/// Only completed enrollments get a certificate. If two issuers race, the
/// unique (user, course) index keeps the first row and both return it.
pub fn issue_record(
    conn: &Connection,
    settings: &CascadeSettings,
    user_id: i64,
    course_id: i64,
    now: DateTime<Utc>,
) -> AppResult<Certificate> {
    if let Some(existing) = store::get_certificate(conn, user_id, course_id)? {
        return Ok(existing);
    }

    let enrollment = catalog::get_enrollment(conn, user_id, course_id)?;
    if !enrollment.is_some_and(|e| e.is_completed) {
        return Err(AppError::Validation(format!(
            "course {} is not completed by user {}",
            course_id, user_id
        )));
    }

    let number = certificate_number(user_id, course_id, now);
    if store::insert_certificate(conn, user_id, course_id, &number, "", &storage::timestamp(now))? {
        let id = conn.last_insert_rowid();
        store::set_certificate_url(conn, id, &certificate_url(settings.public_base_url.as_deref(), id))?;
        log::info!("Issued certificate {} to user {}", number, user_id);
    }

    store::get_certificate(conn, user_id, course_id)?
        .ok_or_else(|| AppError::not_found(format!("certificate for user {} course {}", user_id, course_id)))
}

/// Render the PDF of an issued certificate unless it is already on disk.
pub fn ensure_file(
    conn: &Connection,
    renderer: &dyn CertificateRenderer,
    settings: &CascadeSettings,
    certificate: &Certificate,
) -> AppResult<PathBuf> {
    let path = file_path(settings, certificate);
    if path.exists() {
        return Ok(path);
    }

    let user = users::get_user(conn, certificate.user_id)?
        .ok_or_else(|| AppError::not_found(format!("user {}", certificate.user_id)))?;
    let course = catalog::get_course(conn, certificate.course_id)?
        .ok_or_else(|| AppError::not_found(format!("course {}", certificate.course_id)))?;
    let issued_on = storage::parse_timestamp(&certificate.issued_at)
        .map(|at| at.date_naive())
        .ok_or_else(|| AppError::Render(format!("bad issue date {:?}", certificate.issued_at)))?;

    let content = CertificateContent {
        user: &user,
        course: &course,
        serial: &certificate.certificate_number,
        issued_on,
    };
    renderer.render(&content, &path)
}

/// The PDF of one of the user's own certificates. Someone else's certificate
/// is reported as missing.
pub fn owned_file(
    conn: &Connection,
    renderer: &dyn CertificateRenderer,
    settings: &CascadeSettings,
    user_id: i64,
    certificate_id: i64,
) -> AppResult<(Certificate, PathBuf)> {
    let certificate = store::get_owned_certificate(conn, user_id, certificate_id)?
        .ok_or_else(|| AppError::not_found(format!("certificate {}", certificate_id)))?;
    let path = ensure_file(conn, renderer, settings, &certificate)?;
    Ok((certificate, path))
}

pub fn user_certificates(conn: &Connection, user_id: i64) -> AppResult<Vec<CertificateListing>> {
    Ok(store::list_user_certificates(conn, user_id)?)
}

pub fn user_certificate_for_course(conn: &Connection, user_id: i64, course_id: i64) -> AppResult<CertificateListing> {
    user_certificates(conn, user_id)?
        .into_iter()
        .find(|listing| listing.certificate.course_id == course_id)
        .ok_or_else(|| AppError::not_found(format!("certificate for course {}", course_id)))
}
