use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            email           TEXT NOT NULL UNIQUE,
            password_hash   TEXT NOT NULL,
            name            TEXT NOT NULL,
            phone           TEXT,
            user_type       TEXT NOT NULL DEFAULT 'user'
                            CHECK (user_type IN ('user', 'organizer', 'admin')),
            is_verified     INTEGER NOT NULL DEFAULT 0,
            avatar_url      TEXT,
            bio             TEXT,
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS events (
            id                  TEXT PRIMARY KEY,
            organizer_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            title               TEXT NOT NULL,
            description         TEXT,
            category            TEXT,
            start_time          TEXT NOT NULL,
            end_time            TEXT NOT NULL,
            price               REAL,
            location_name       TEXT,
            latitude            REAL NOT NULL,
            longitude           REAL NOT NULL,
            capacity            INTEGER,
            current_attendance  INTEGER NOT NULL DEFAULT 0,
            image_url           TEXT,
            is_active           INTEGER NOT NULL DEFAULT 1,
            is_approved         INTEGER NOT NULL DEFAULT 0,
            status              TEXT NOT NULL DEFAULT 'upcoming'
                                CHECK (status IN ('upcoming', 'ongoing', 'completed', 'cancelled')),
            created_at          TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at          TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_events_organizer ON events(organizer_id);
        CREATE INDEX IF NOT EXISTS idx_events_visible ON events(is_active, is_approved);

        CREATE TABLE IF NOT EXISTS user_likes (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            event_id    TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(user_id, event_id)
        );

        CREATE INDEX IF NOT EXISTS idx_likes_event ON user_likes(event_id);

        CREATE TABLE IF NOT EXISTS check_ins (
            id              TEXT PRIMARY KEY,
            user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            event_id        TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            latitude        REAL,
            longitude       REAL,
            checked_in_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- One check-in per user per event per day
        CREATE UNIQUE INDEX IF NOT EXISTS idx_checkins_unique
            ON check_ins(user_id, event_id, date(checked_in_at));
        CREATE INDEX IF NOT EXISTS idx_checkins_event ON check_ins(event_id);

        CREATE TABLE IF NOT EXISTS chat_messages (
            id          TEXT PRIMARY KEY,
            user_id     TEXT REFERENCES users(id) ON DELETE CASCADE,
            event_id    TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            message     TEXT NOT NULL,
            sender_type TEXT NOT NULL DEFAULT 'user'
                        CHECK (sender_type IN ('user', 'organizer', 'bot')),
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_event
            ON chat_messages(event_id, created_at);

        CREATE TABLE IF NOT EXISTS riders (
            id                  TEXT PRIMARY KEY,
            user_id             TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
            vehicle_id          TEXT,
            license_id          TEXT,
            profile_photo_url   TEXT,
            emergency_contact   TEXT,
            nid_number          TEXT,
            bank_name           TEXT,
            account_number      TEXT,
            account_holder_name TEXT,
            terms_accepted      INTEGER NOT NULL DEFAULT 0,
            registration_status TEXT NOT NULL DEFAULT 'pending'
                                CHECK (registration_status IN ('pending', 'approved', 'rejected')),
            rejection_reason    TEXT,
            approved_at         TEXT,
            is_online           INTEGER NOT NULL DEFAULT 0,
            is_active           INTEGER NOT NULL DEFAULT 1,
            current_latitude    REAL,
            current_longitude   REAL,
            total_rides         INTEGER NOT NULL DEFAULT 0,
            total_earnings      REAL NOT NULL DEFAULT 0,
            created_at          TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at          TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS vehicles (
            id                          TEXT PRIMARY KEY,
            rider_id                    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            make                        TEXT NOT NULL,
            model                       TEXT NOT NULL,
            year                        INTEGER NOT NULL,
            color                       TEXT,
            license_plate               TEXT NOT NULL UNIQUE,
            vehicle_type                TEXT NOT NULL DEFAULT 'sedan',
            seats_available             INTEGER NOT NULL DEFAULT 4,
            registration_document_url   TEXT,
            billbook_photo_url          TEXT,
            created_at                  TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at                  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS driver_licenses (
            id                  TEXT PRIMARY KEY,
            rider_id            TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            license_number      TEXT NOT NULL UNIQUE,
            license_photo_url   TEXT NOT NULL,
            expiry_date         TEXT NOT NULL,
            issued_date         TEXT,
            issuing_authority   TEXT,
            license_holder_name TEXT,
            date_of_birth       TEXT,
            verification_status TEXT NOT NULL DEFAULT 'pending'
                                CHECK (verification_status IN ('pending', 'approved', 'rejected')),
            rejection_reason    TEXT,
            verified_at         TEXT,
            created_at          TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at          TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS ride_requests (
            id                  TEXT PRIMARY KEY,
            user_id             TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            rider_id            TEXT REFERENCES riders(id),
            pickup_latitude     REAL NOT NULL,
            pickup_longitude    REAL NOT NULL,
            pickup_address      TEXT NOT NULL,
            dropoff_latitude    REAL NOT NULL,
            dropoff_longitude   REAL NOT NULL,
            dropoff_address     TEXT NOT NULL,
            distance_km         REAL NOT NULL,
            estimated_price     REAL NOT NULL,
            requested_price     REAL,
            user_phone          TEXT NOT NULL,
            rider_phone         TEXT,
            notes               TEXT,
            vehicle_type        TEXT NOT NULL DEFAULT 'sedan',
            status              TEXT NOT NULL DEFAULT 'pending'
                                CHECK (status IN ('pending', 'accepted', 'in_progress', 'completed',
                                                  'passenger_cancelled', 'rider_cancelled')),
            cancellation_reason TEXT,
            accepted_at         TEXT,
            started_at          TEXT,
            completed_at        TEXT,
            cancelled_at        TEXT,
            created_at          TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at          TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_ride_requests_user ON ride_requests(user_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_ride_requests_rider ON ride_requests(rider_id, status);
        CREATE INDEX IF NOT EXISTS idx_ride_requests_status ON ride_requests(status);

        CREATE TABLE IF NOT EXISTS ride_offers (
            id              TEXT PRIMARY KEY,
            ride_request_id TEXT NOT NULL REFERENCES ride_requests(id) ON DELETE CASCADE,
            rider_id        TEXT NOT NULL REFERENCES riders(id) ON DELETE CASCADE,
            offered_price   REAL NOT NULL,
            status          TEXT NOT NULL DEFAULT 'pending'
                            CHECK (status IN ('pending', 'accepted', 'rejected')),
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_ride_offers_request ON ride_offers(ride_request_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
