use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};

/// What a community groups people by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CommunityKind {
    /// Same craft, keyed by course category
    Profession,
    /// Same city
    City,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Community {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub kind: String,
    pub city: Option<String>,
    pub category: Option<String>,
    pub telegram_link: String,
}

const COLUMNS: &str = "id, title, description, kind, city, category, telegram_link";

fn parse_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Community> {
    Ok(Community {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        kind: row.get(3)?,
        city: row.get(4)?,
        category: row.get(5)?,
        telegram_link: row.get(6)?,
    })
}

pub fn create_community(
    conn: &Connection,
    title: &str,
    kind: CommunityKind,
    city: Option<&str>,
    category: Option<&str>,
    telegram_link: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO communities (title, kind, city, category, telegram_link) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![title, kind.as_ref(), city, category, telegram_link],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_profession_community(conn: &Connection, category: &str) -> rusqlite::Result<Option<Community>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM communities WHERE kind = ?1 AND category = ?2 ORDER BY id LIMIT 1",
            COLUMNS
        ),
        params![CommunityKind::Profession.as_ref(), category],
        parse_row,
    )
    .optional()
}

/// City match is case-insensitive.
pub fn find_city_community(conn: &Connection, city: &str) -> rusqlite::Result<Option<Community>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM communities WHERE kind = ?1 AND city = ?2 COLLATE NOCASE ORDER BY id LIMIT 1",
            COLUMNS
        ),
        params![CommunityKind::City.as_ref(), city.trim()],
        parse_row,
    )
    .optional()
}

pub fn first_community(conn: &Connection) -> rusqlite::Result<Option<Community>> {
    conn.query_row(
        &format!("SELECT {} FROM communities ORDER BY id LIMIT 1", COLUMNS),
        [],
        parse_row,
    )
    .optional()
}
