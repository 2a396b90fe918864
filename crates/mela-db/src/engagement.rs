use anyhow::Result;
use rusqlite::OptionalExtension;
use uuid::Uuid;

use mela_types::models::{CheckIn, Event};

use crate::Database;
use crate::models::{CHECKIN_COLS, EVENT_COLS, checkin_from_row, event_from_row};

impl Database {
    // -- Likes --

    /// Toggle a like: removes if present, inserts if not. Returns true when
    /// the like was added.
    pub fn toggle_like(&self, id: Uuid, user_id: Uuid, event_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT id FROM user_likes WHERE user_id = ?1 AND event_id = ?2",
                    [user_id.to_string(), event_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(existing_id) = existing {
                conn.execute("DELETE FROM user_likes WHERE id = ?1", [existing_id])?;
                Ok(false)
            } else {
                conn.execute(
                    "INSERT INTO user_likes (id, user_id, event_id) VALUES (?1, ?2, ?3)",
                    [id.to_string(), user_id.to_string(), event_id.to_string()],
                )?;
                Ok(true)
            }
        })
    }

    pub fn liked_event_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT event_id FROM user_likes WHERE user_id = ?1")?;
            let rows = stmt
                .query_map([user_id.to_string()], |row| crate::convert::get_uuid(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Liked events with full details, newest like first.
    pub fn liked_events(&self, user_id: Uuid) -> Result<Vec<Event>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLS} FROM user_likes ul
                 JOIN events e ON ul.event_id = e.id
                 WHERE ul.user_id = ?1
                 ORDER BY ul.created_at DESC"
            ))?;
            let rows = stmt
                .query_map([user_id.to_string()], event_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Check-ins --

    pub fn insert_checkin(
        &self,
        id: Uuid,
        user_id: Uuid,
        event_id: Uuid,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<CheckIn> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO check_ins (id, user_id, event_id, latitude, longitude)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    id.to_string(),
                    user_id.to_string(),
                    event_id.to_string(),
                    latitude,
                    longitude
                ],
            )?;
            conn.query_row(
                &format!("SELECT {CHECKIN_COLS} FROM check_ins ci WHERE ci.id = ?1"),
                [id.to_string()],
                checkin_from_row,
            )
            .map_err(Into::into)
        })
    }

    /// The caller's check-ins joined with event details, newest first.
    pub fn user_checkins(&self, user_id: Uuid) -> Result<Vec<(CheckIn, Event)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHECKIN_COLS}, {EVENT_COLS} FROM check_ins ci
                 JOIN events e ON ci.event_id = e.id
                 WHERE ci.user_id = ?1
                 ORDER BY ci.checked_in_at DESC"
            ))?;
            let rows = stmt
                .query_map([user_id.to_string()], |row| {
                    let checkin = checkin_from_row(row)?;
                    // Event columns start after the check-in's 6.
                    let event = crate::models::event_from_row_at(row, 6)?;
                    Ok((checkin, event))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn event_checkins(&self, event_id: Uuid) -> Result<Vec<CheckIn>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHECKIN_COLS} FROM check_ins ci
                 WHERE ci.event_id = ?1
                 ORDER BY ci.checked_in_at DESC"
            ))?;
            let rows = stmt
                .query_map([event_id.to_string()], checkin_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use mela_types::models::UserType;

    use crate::test_support::{db, seed_event, seed_user};

    #[test]
    fn like_toggles_on_and_off() {
        let db = db();
        let user = seed_user(&db, UserType::User, true);
        let organizer = seed_user(&db, UserType::Organizer, true);
        let event = seed_event(&db, organizer, true);

        assert!(db.toggle_like(Uuid::new_v4(), user, event).unwrap());
        assert_eq!(db.liked_event_ids(user).unwrap(), vec![event]);
        assert_eq!(db.event_with_stats(event).unwrap().unwrap().like_count, 1);

        assert!(!db.toggle_like(Uuid::new_v4(), user, event).unwrap());
        assert!(db.liked_event_ids(user).unwrap().is_empty());
    }

    #[test]
    fn checkin_shows_up_in_counts_and_history() {
        let db = db();
        let user = seed_user(&db, UserType::User, true);
        let organizer = seed_user(&db, UserType::Organizer, true);
        let event = seed_event(&db, organizer, true);

        let checkin = db
            .insert_checkin(Uuid::new_v4(), user, event, Some(27.7), Some(85.3))
            .unwrap();
        db.increment_attendance(event).unwrap();
        assert_eq!(checkin.event_id, event);

        let stats = db.event_with_stats(event).unwrap().unwrap();
        assert_eq!(stats.checkin_count, 1);
        assert_eq!(stats.event.current_attendance, 1);

        let mine = db.user_checkins(user).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].1.id, event);
        assert_eq!(db.event_checkins(event).unwrap().len(), 1);
    }

    #[test]
    fn second_checkin_same_day_is_rejected() {
        let db = db();
        let user = seed_user(&db, UserType::User, true);
        let organizer = seed_user(&db, UserType::Organizer, true);
        let event = seed_event(&db, organizer, true);

        db.insert_checkin(Uuid::new_v4(), user, event, None, None)
            .unwrap();
        assert!(
            db.insert_checkin(Uuid::new_v4(), user, event, None, None)
                .is_err()
        );
    }
}
