use anyhow::Result;
use rusqlite::OptionalExtension;
use uuid::Uuid;

use mela_types::models::{User, UserType};

use crate::Database;
use crate::models::{USER_COLS, user_from_row};

impl Database {
    pub fn create_user(
        &self,
        id: Uuid,
        email: &str,
        password_hash: &str,
        name: &str,
        user_type: UserType,
        is_verified: bool,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password_hash, name, user_type, is_verified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    id.to_string(),
                    email,
                    password_hash,
                    name,
                    user_type.as_str(),
                    is_verified
                ],
            )?;
            Ok(())
        })
    }

    pub fn email_taken(&self, email: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let hit: Option<i64> = conn
                .query_row("SELECT 1 FROM users WHERE email = ?1", [email], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(hit.is_some())
        })
    }

    /// User plus stored password hash, for login verification.
    pub fn user_auth_by_email(&self, email: &str) -> Result<Option<(User, String)>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {USER_COLS}, u.password_hash FROM users u WHERE u.email = ?1"
                    ),
                    [email],
                    |row| Ok((user_from_row(row)?, row.get::<_, String>(9)?)),
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {USER_COLS} FROM users u WHERE u.id = ?1"),
                    [id.to_string()],
                    user_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Partial profile update; absent fields keep their current value.
    pub fn update_user_profile(
        &self,
        id: Uuid,
        name: Option<&str>,
        phone: Option<&str>,
        bio: Option<&str>,
    ) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users
                 SET name = COALESCE(?1, name),
                     phone = COALESCE(?2, phone),
                     bio = COALESCE(?3, bio),
                     updated_at = datetime('now')
                 WHERE id = ?4",
                rusqlite::params![name, phone, bio, id.to_string()],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            conn.query_row(
                &format!("SELECT {USER_COLS} FROM users u WHERE u.id = ?1"),
                [id.to_string()],
                user_from_row,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    // -- Admin: organizer verification --

    pub fn pending_organizers(&self) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLS} FROM users u
                 WHERE u.user_type = 'organizer' AND u.is_verified = 0
                 ORDER BY u.created_at DESC"
            ))?;
            let rows = stmt
                .query_map([], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn organizer_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {USER_COLS} FROM users u
                         WHERE u.id = ?1 AND u.user_type = 'organizer'"
                    ),
                    [id.to_string()],
                    user_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn verify_organizer(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET is_verified = 1, updated_at = datetime('now')
                 WHERE id = ?1 AND user_type = 'organizer'",
                [id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }

    /// Rejection demotes the account back to a plain user.
    pub fn demote_organizer(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET user_type = 'user', updated_at = datetime('now')
                 WHERE id = ?1 AND user_type = 'organizer'",
                [id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }
}
