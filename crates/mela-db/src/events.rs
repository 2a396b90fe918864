use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, types::ToSql};
use uuid::Uuid;

use mela_geo::haversine_km;
use mela_types::api::{CreateEventRequest, EventAnalytics, UpdateEventRequest};
use mela_types::models::{Event, EventStatus, EventWithOrganizer, EventWithStats, GeoPoint};

use crate::Database;
use crate::models::{EVENT_COL_COUNT, EVENT_COLS, event_from_row};

/// Engagement counts appended after the event columns.
const STAT_COLS: &str = "(SELECT COUNT(*) FROM user_likes ul WHERE ul.event_id = e.id), \
     (SELECT COUNT(*) FROM check_ins ci WHERE ci.event_id = e.id)";

fn event_with_stats_from_row(row: &Row<'_>) -> rusqlite::Result<EventWithStats> {
    Ok(EventWithStats {
        event: event_from_row(row)?,
        like_count: row.get(EVENT_COL_COUNT)?,
        checkin_count: row.get(EVENT_COL_COUNT + 1)?,
    })
}

impl Database {
    pub fn create_event(&self, id: Uuid, organizer_id: Uuid, req: &CreateEventRequest) -> Result<Event> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO events (id, organizer_id, title, description, category, start_time,
                                     end_time, price, location_name, latitude, longitude, capacity,
                                     image_url, is_approved)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 0)",
                rusqlite::params![
                    id.to_string(),
                    organizer_id.to_string(),
                    req.title,
                    req.description,
                    req.category,
                    req.start_time.to_rfc3339(),
                    req.end_time.to_rfc3339(),
                    req.price,
                    req.location_name,
                    req.latitude,
                    req.longitude,
                    req.capacity,
                    req.image_url,
                ],
            )?;
            conn.query_row(
                &format!("SELECT {EVENT_COLS} FROM events e WHERE e.id = ?1"),
                [id.to_string()],
                event_from_row,
            )
            .map_err(Into::into)
        })
    }

    pub fn event_by_id(&self, id: Uuid) -> Result<Option<Event>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {EVENT_COLS} FROM events e WHERE e.id = ?1"),
                    [id.to_string()],
                    event_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Any event by id, with engagement counts. Unlike the listing this does
    /// not filter on approval, so organizers can inspect their own pending
    /// events.
    pub fn event_with_stats(&self, id: Uuid) -> Result<Option<EventWithStats>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {EVENT_COLS}, {STAT_COLS} FROM events e WHERE e.id = ?1"),
                    [id.to_string()],
                    event_with_stats_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// The public listing: only `is_active AND is_approved` events, optional
    /// category/status filters in SQL, then the optional radius filter and
    /// paging applied over the ordered rows. Locations live in plain lat/lng
    /// columns, so the radius predicate is the Haversine helper rather than
    /// a spatial index.
    #[allow(clippy::too_many_arguments)]
    pub fn list_public_events(
        &self,
        near: Option<GeoPoint>,
        radius_km: f64,
        category: Option<&str>,
        status: Option<EventStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<EventWithStats>> {
        self.with_conn(|conn| {
            let mut sql = format!(
                "SELECT {EVENT_COLS}, {STAT_COLS} FROM events e
                 WHERE e.is_active = 1 AND e.is_approved = 1"
            );
            let mut params: Vec<Box<dyn ToSql>> = Vec::new();

            if let Some(category) = category {
                params.push(Box::new(category.to_string()));
                sql.push_str(&format!(" AND e.category = ?{}", params.len()));
            }
            if let Some(status) = status {
                params.push(Box::new(status.as_str()));
                sql.push_str(&format!(" AND e.status = ?{}", params.len()));
            }
            sql.push_str(" ORDER BY e.start_time ASC");

            let mut stmt = conn.prepare(&sql)?;
            let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
            let rows = stmt
                .query_map(param_refs.as_slice(), event_with_stats_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let events = rows
                .into_iter()
                .filter(|ev| match near {
                    Some(center) => haversine_km(center, ev.event.location()) <= radius_km,
                    None => true,
                })
                .skip(offset)
                .take(limit)
                .collect();

            Ok(events)
        })
    }

    /// Upcoming approved events ranked by engagement.
    pub fn trending_events(&self, now: DateTime<Utc>) -> Result<Vec<EventWithStats>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLS}, {STAT_COLS} FROM events e
                 WHERE e.is_active = 1 AND e.is_approved = 1 AND e.start_time > ?1
                 ORDER BY (SELECT COUNT(*) FROM user_likes ul WHERE ul.event_id = e.id) DESC,
                          (SELECT COUNT(*) FROM check_ins ci WHERE ci.event_id = e.id) DESC
                 LIMIT 10"
            ))?;
            let rows = stmt
                .query_map([now.to_rfc3339()], event_with_stats_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Owner-scoped partial update. Returns the updated event, or None when
    /// the event does not exist or belongs to someone else.
    pub fn update_event(
        &self,
        id: Uuid,
        organizer_id: Uuid,
        req: &UpdateEventRequest,
    ) -> Result<Option<Event>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE events
                 SET title = COALESCE(?1, title),
                     description = COALESCE(?2, description),
                     status = COALESCE(?3, status),
                     current_attendance = COALESCE(?4, current_attendance),
                     end_time = COALESCE(?5, end_time),
                     updated_at = datetime('now')
                 WHERE id = ?6 AND organizer_id = ?7",
                rusqlite::params![
                    req.title,
                    req.description,
                    req.status.map(|s| s.as_str()),
                    req.current_attendance,
                    req.end_time.map(|t| t.to_rfc3339()),
                    id.to_string(),
                    organizer_id.to_string(),
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            conn.query_row(
                &format!("SELECT {EVENT_COLS} FROM events e WHERE e.id = ?1"),
                [id.to_string()],
                event_from_row,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    pub fn delete_event(&self, id: Uuid, organizer_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM events WHERE id = ?1 AND organizer_id = ?2",
                [id.to_string(), organizer_id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn organizer_events(&self, organizer_id: Uuid) -> Result<Vec<Event>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLS} FROM events e
                 WHERE e.organizer_id = ?1 ORDER BY e.created_at DESC"
            ))?;
            let rows = stmt
                .query_map([organizer_id.to_string()], event_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn event_analytics(&self, id: Uuid, organizer_id: Uuid) -> Result<Option<EventAnalytics>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT e.id, e.title, e.current_attendance,
                            (SELECT COUNT(*) FROM user_likes ul WHERE ul.event_id = e.id),
                            (SELECT COUNT(*) FROM check_ins ci WHERE ci.event_id = e.id),
                            (SELECT COUNT(DISTINCT cm.user_id) FROM chat_messages cm
                              WHERE cm.event_id = e.id AND cm.user_id IS NOT NULL),
                            (SELECT COUNT(*) FROM chat_messages cm WHERE cm.event_id = e.id)
                     FROM events e
                     WHERE e.id = ?1 AND e.organizer_id = ?2",
                    [id.to_string(), organizer_id.to_string()],
                    |row| {
                        Ok(EventAnalytics {
                            id: crate::convert::get_uuid(row, 0)?,
                            title: row.get(1)?,
                            current_attendance: row.get(2)?,
                            like_count: row.get(3)?,
                            checkin_count: row.get(4)?,
                            unique_chat_users: row.get(5)?,
                            total_messages: row.get(6)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn increment_attendance(&self, id: Uuid) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE events SET current_attendance = current_attendance + 1 WHERE id = ?1",
                [id.to_string()],
            )?;
            Ok(())
        })
    }

    /// Live status push from the gateway.
    pub fn set_event_status(
        &self,
        id: Uuid,
        status: EventStatus,
        current_attendance: i64,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE events SET status = ?1, current_attendance = ?2,
                        updated_at = datetime('now')
                 WHERE id = ?3",
                rusqlite::params![status.as_str(), current_attendance, id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Admin: approval workflow --

    fn events_with_organizer(&self, approved: bool) -> Result<Vec<EventWithOrganizer>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLS}, u.name, u.email
                 FROM events e JOIN users u ON e.organizer_id = u.id
                 WHERE e.is_approved = ?1
                 ORDER BY e.created_at DESC"
            ))?;
            let rows = stmt
                .query_map([approved], |row| {
                    Ok(EventWithOrganizer {
                        event: event_from_row(row)?,
                        organizer_name: row.get(EVENT_COL_COUNT)?,
                        organizer_email: row.get(EVENT_COL_COUNT + 1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn pending_events(&self) -> Result<Vec<EventWithOrganizer>> {
        self.events_with_organizer(false)
    }

    pub fn approved_events(&self) -> Result<Vec<EventWithOrganizer>> {
        self.events_with_organizer(true)
    }

    pub fn approve_event(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE events SET is_approved = 1, updated_at = datetime('now') WHERE id = ?1",
                [id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }

    /// Rejection also deactivates, so the event drops out of every listing.
    pub fn reject_event(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE events SET is_approved = 0, is_active = 0,
                        updated_at = datetime('now')
                 WHERE id = ?1",
                [id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn admin_delete_event(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM events WHERE id = ?1", [id.to_string()])?;
            Ok(changed > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use mela_types::api::UpdateEventRequest;
    use mela_types::models::{EventStatus, GeoPoint, UserType};

    use crate::test_support::{db, event_request, seed_event, seed_user};

    #[test]
    fn unapproved_events_are_hidden_from_the_public_listing() {
        let db = db();
        let organizer = seed_user(&db, UserType::Organizer, true);
        let pending = seed_event(&db, organizer, false);
        let approved = seed_event(&db, organizer, true);

        let listed = db
            .list_public_events(None, 5.0, None, None, 20, 0)
            .unwrap();
        let ids: Vec<Uuid> = listed.iter().map(|e| e.event.id).collect();
        assert!(ids.contains(&approved));
        assert!(!ids.contains(&pending));

        // Still fetchable directly, e.g. by its organizer.
        assert!(db.event_with_stats(pending).unwrap().is_some());
    }

    #[test]
    fn rejected_events_drop_out_entirely() {
        let db = db();
        let organizer = seed_user(&db, UserType::Organizer, true);
        let event = seed_event(&db, organizer, true);

        assert!(db.reject_event(event).unwrap());
        let listed = db
            .list_public_events(None, 5.0, None, None, 20, 0)
            .unwrap();
        assert!(listed.iter().all(|e| e.event.id != event));
    }

    #[test]
    fn radius_filter_keeps_only_nearby_events() {
        let db = db();
        let organizer = seed_user(&db, UserType::Organizer, true);
        let near = db
            .create_event(Uuid::new_v4(), organizer, &event_request(27.70, 85.32))
            .unwrap();
        let far = db
            .create_event(Uuid::new_v4(), organizer, &event_request(28.21, 83.99))
            .unwrap();
        db.approve_event(near.id).unwrap();
        db.approve_event(far.id).unwrap();

        let center = GeoPoint {
            latitude: 27.7172,
            longitude: 85.3240,
        };
        let listed = db
            .list_public_events(Some(center), 5.0, None, None, 20, 0)
            .unwrap();
        let ids: Vec<Uuid> = listed.iter().map(|e| e.event.id).collect();
        assert!(ids.contains(&near.id));
        assert!(!ids.contains(&far.id));
    }

    #[test]
    fn update_is_scoped_to_the_owner() {
        let db = db();
        let owner = seed_user(&db, UserType::Organizer, true);
        let other = seed_user(&db, UserType::Organizer, true);
        let event = seed_event(&db, owner, true);

        let req = UpdateEventRequest {
            title: Some("Renamed".into()),
            description: None,
            status: Some(EventStatus::Ongoing),
            current_attendance: None,
            end_time: None,
        };
        assert!(db.update_event(event, other, &req).unwrap().is_none());

        let updated = db.update_event(event, owner, &req).unwrap().unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.status, EventStatus::Ongoing);
        // COALESCE kept the untouched fields
        assert!(updated.description.is_some());
    }

    #[test]
    fn trending_ranks_by_likes() {
        let db = db();
        let organizer = seed_user(&db, UserType::Organizer, true);
        let quiet = seed_event(&db, organizer, true);
        let popular = seed_event(&db, organizer, true);
        for _ in 0..3 {
            let fan = seed_user(&db, UserType::User, true);
            assert!(db.toggle_like(Uuid::new_v4(), fan, popular).unwrap());
        }

        let trending = db.trending_events(Utc::now()).unwrap();
        let ids: Vec<Uuid> = trending.iter().map(|e| e.event.id).collect();
        assert_eq!(ids.first(), Some(&popular));
        assert!(ids.contains(&quiet));
    }
}
