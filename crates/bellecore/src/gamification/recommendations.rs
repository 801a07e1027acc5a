//! What to suggest after a course is finished.

use rusqlite::Connection;

use crate::core::error::AppResult;
use crate::storage::catalog::{self, Course};
use crate::storage::communities::{self, Community};
use crate::storage::users::User;

/// Next course: same category first, then any other active course the user
/// does not have yet.
pub fn next_course(conn: &Connection, user_id: i64, completed: &Course) -> AppResult<Option<Course>> {
    if let Some(course) = catalog::find_unenrolled_course(conn, user_id, completed.id, Some(&completed.category))? {
        return Ok(Some(course));
    }
    Ok(catalog::find_unenrolled_course(conn, user_id, completed.id, None)?)
}

/// A community and the line explaining why it was picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommunityPick {
    pub community: Community,
    pub reason: String,
}

/// Profession community of the course category, then the user's city
/// community, then whatever exists.
pub fn community_for(conn: &Connection, user: &User, course: &Course) -> AppResult<Option<CommunityPick>> {
    if let Some(community) = communities::find_profession_community(conn, &course.category)? {
        return Ok(Some(CommunityPick {
            community,
            reason: "Connect with other masters of your craft.".to_string(),
        }));
    }

    if let Some(city) = user.city.as_deref().filter(|city| !city.trim().is_empty()) {
        if let Some(community) = communities::find_city_community(conn, city)? {
            return Ok(Some(CommunityPick {
                community,
                reason: format!("Meet beauty masters from {}.", city.trim()),
            }));
        }
    }

    Ok(communities::first_community(conn)?.map(|community| CommunityPick {
        community,
        reason: String::new(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::catalog::{create_course, get_course, grant_access};
    use crate::storage::communities::{create_community, CommunityKind};
    use crate::storage::test_connection;
    use crate::storage::users::{create_user, get_user, NewUser};

    #[test]
    fn next_course_prefers_same_category() {
        let conn = test_connection();
        let user = create_user(&conn, &NewUser { telegram_id: 1, full_name: "A", ..Default::default() }).unwrap();
        let done = create_course(&conn, "Gel basics", "", "manicure").unwrap();
        let lashes = create_course(&conn, "Lashes", "", "eyelashes").unwrap();
        let gel_pro = create_course(&conn, "Gel pro", "", "manicure").unwrap();
        grant_access(&conn, user, done).unwrap();
        let completed = get_course(&conn, done).unwrap().unwrap();

        assert_eq!(next_course(&conn, user, &completed).unwrap().map(|c| c.id), Some(gel_pro));
        grant_access(&conn, user, gel_pro).unwrap();
        assert_eq!(next_course(&conn, user, &completed).unwrap().map(|c| c.id), Some(lashes));
        grant_access(&conn, user, lashes).unwrap();
        assert!(next_course(&conn, user, &completed).unwrap().is_none());
    }

    #[test]
    fn community_fallback_chain() {
        let conn = test_connection();
        let user_id = create_user(
            &conn,
            &NewUser { telegram_id: 1, full_name: "A", city: Some("Kazan"), ..Default::default() },
        )
        .unwrap();
        let user = get_user(&conn, user_id).unwrap().unwrap();
        let course_id = create_course(&conn, "Brows", "", "brows").unwrap();
        let course = get_course(&conn, course_id).unwrap().unwrap();

        assert!(community_for(&conn, &user, &course).unwrap().is_none());

        let anywhere =
            create_community(&conn, "Moscow", CommunityKind::City, Some("Moscow"), None, "https://t.me/msk").unwrap();
        let pick = community_for(&conn, &user, &course).unwrap().unwrap();
        assert_eq!(pick.community.id, anywhere);
        assert!(pick.reason.is_empty());

        let city = create_community(&conn, "Kazan", CommunityKind::City, Some("Kazan"), None, "https://t.me/kzn").unwrap();
        assert_eq!(community_for(&conn, &user, &course).unwrap().unwrap().community.id, city);

        let prof =
            create_community(&conn, "Brow pros", CommunityKind::Profession, None, Some("brows"), "https://t.me/brow")
                .unwrap();
        assert_eq!(community_for(&conn, &user, &course).unwrap().unwrap().community.id, prof);
    }
}
