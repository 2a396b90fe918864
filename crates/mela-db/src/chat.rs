use anyhow::Result;
use uuid::Uuid;

use mela_types::models::{ChatMessage, SenderType};

use crate::Database;
use crate::models::chat_message_from_row;

/// Bot rows have a NULL user_id; the display name is synthesized in SQL so
/// every read path renders them the same way.
const MESSAGE_COLS: &str = "cm.id, cm.user_id, cm.event_id, cm.message, cm.sender_type, \
     CASE WHEN cm.sender_type = 'bot' THEN 'Event Assistant' \
          ELSE COALESCE(u.name, 'User') END, \
     cm.created_at";

impl Database {
    pub fn insert_chat_message(
        &self,
        id: Uuid,
        user_id: Uuid,
        event_id: Uuid,
        message: &str,
        sender_type: SenderType,
    ) -> Result<ChatMessage> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chat_messages (id, user_id, event_id, message, sender_type)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    id.to_string(),
                    user_id.to_string(),
                    event_id.to_string(),
                    message,
                    sender_type.as_str()
                ],
            )?;
            self.fetch_message(conn, id)
        })
    }

    /// AI auto-replies are persisted without an author.
    pub fn insert_bot_message(&self, id: Uuid, event_id: Uuid, message: &str) -> Result<ChatMessage> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chat_messages (id, user_id, event_id, message, sender_type)
                 VALUES (?1, NULL, ?2, ?3, 'bot')",
                rusqlite::params![id.to_string(), event_id.to_string(), message],
            )?;
            self.fetch_message(conn, id)
        })
    }

    fn fetch_message(&self, conn: &rusqlite::Connection, id: Uuid) -> Result<ChatMessage> {
        conn.query_row(
            &format!(
                "SELECT {MESSAGE_COLS} FROM chat_messages cm
                 LEFT JOIN users u ON cm.user_id = u.id
                 WHERE cm.id = ?1"
            ),
            [id.to_string()],
            chat_message_from_row,
        )
        .map_err(Into::into)
    }

    /// Most recent page of an event's messages, returned oldest-first for
    /// display.
    pub fn event_messages(
        &self,
        event_id: Uuid,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ChatMessage>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLS} FROM chat_messages cm
                 LEFT JOIN users u ON cm.user_id = u.id
                 WHERE cm.event_id = ?1
                 ORDER BY cm.created_at DESC, cm.rowid DESC
                 LIMIT ?2 OFFSET ?3"
            ))?;
            let mut rows = stmt
                .query_map(
                    rusqlite::params![event_id.to_string(), limit, offset],
                    chat_message_from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.reverse();
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use mela_types::models::{SenderType, UserType};

    use crate::test_support::{db, seed_event, seed_user};

    #[test]
    fn history_is_oldest_first_and_bot_rows_get_the_assistant_name() {
        let db = db();
        let organizer = seed_user(&db, UserType::Organizer, true);
        let user = seed_user(&db, UserType::User, true);
        let event = seed_event(&db, organizer, true);

        db.insert_chat_message(Uuid::new_v4(), user, event, "when does it start?", SenderType::User)
            .unwrap();
        let reply = db
            .insert_bot_message(Uuid::new_v4(), event, "Doors open at 6pm.")
            .unwrap();
        assert_eq!(reply.user_id, None);
        assert_eq!(reply.user_name, "Event Assistant");

        let history = db.event_messages(event, 50, 0).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].message, "when does it start?");
        assert_eq!(history[0].user_name, "Test User");
        assert_eq!(history[1].sender_type, SenderType::Bot);
    }
}
