use anyhow::Result;
use rusqlite::{OptionalExtension, types::ToSql};
use uuid::Uuid;

use mela_types::api::{RiderLicenseRequest, RiderPersonalRequest};
use mela_types::models::{
    DriverLicense, GeoPoint, LicenseView, RegistrationStatus, Rider, RiderProfile, Vehicle,
    VehicleType,
};

use crate::Database;
use crate::models::{
    LICENSE_COL_COUNT, LICENSE_COLS, RIDER_COL_COUNT, RIDER_COLS, VEHICLE_COL_COUNT, VEHICLE_COLS,
    license_from_row_at, license_opt_from_row_at, rider_from_row, vehicle_from_row_at,
    vehicle_opt_from_row_at,
};

impl Database {
    // -- Registration steps --

    /// Step 0: personal info. Re-submitting replaces the previous values but
    /// keeps the row (and its pending status).
    pub fn upsert_rider_personal(
        &self,
        id: Uuid,
        user_id: Uuid,
        req: &RiderPersonalRequest,
    ) -> Result<Rider> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO riders (id, user_id, profile_photo_url, emergency_contact,
                                     nid_number, bank_name, account_number, account_holder_name,
                                     terms_accepted, registration_status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'pending')
                 ON CONFLICT(user_id) DO UPDATE SET
                     profile_photo_url = excluded.profile_photo_url,
                     emergency_contact = excluded.emergency_contact,
                     nid_number = excluded.nid_number,
                     bank_name = excluded.bank_name,
                     account_number = excluded.account_number,
                     account_holder_name = excluded.account_holder_name,
                     terms_accepted = excluded.terms_accepted,
                     updated_at = datetime('now')",
                rusqlite::params![
                    id.to_string(),
                    user_id.to_string(),
                    req.profile_photo_url,
                    req.emergency_contact,
                    req.nid_number,
                    req.bank_name,
                    req.account_number,
                    req.account_holder_name,
                    req.terms_accepted.unwrap_or(false),
                ],
            )?;
            query_rider_by_user(conn, user_id)?
                .ok_or_else(|| anyhow::anyhow!("rider row missing after upsert"))
        })
    }

    /// Step 1: vehicle info, keyed on the license plate.
    #[allow(clippy::too_many_arguments)]
    pub fn upsert_vehicle(
        &self,
        id: Uuid,
        user_id: Uuid,
        make: &str,
        model: &str,
        year: i64,
        color: Option<&str>,
        license_plate: &str,
        vehicle_type: VehicleType,
        seats_available: i64,
        registration_document_url: Option<&str>,
        billbook_photo_url: Option<&str>,
    ) -> Result<Vehicle> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO vehicles (id, rider_id, make, model, year, color, license_plate,
                                       vehicle_type, seats_available, registration_document_url,
                                       billbook_photo_url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(license_plate) DO UPDATE SET
                     make = excluded.make,
                     model = excluded.model,
                     year = excluded.year,
                     color = excluded.color,
                     vehicle_type = excluded.vehicle_type,
                     seats_available = excluded.seats_available,
                     registration_document_url = excluded.registration_document_url,
                     billbook_photo_url = excluded.billbook_photo_url,
                     updated_at = datetime('now')",
                rusqlite::params![
                    id.to_string(),
                    user_id.to_string(),
                    make,
                    model,
                    year,
                    color,
                    license_plate,
                    vehicle_type.as_str(),
                    seats_available,
                    registration_document_url,
                    billbook_photo_url,
                ],
            )?;
            conn.query_row(
                &format!("SELECT {VEHICLE_COLS} FROM vehicles v WHERE v.license_plate = ?1"),
                [license_plate],
                |row| vehicle_from_row_at(row, 0),
            )
            .map_err(Into::into)
        })
    }

    pub fn license_number_taken(&self, license_number: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let hit: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM driver_licenses WHERE license_number = ?1",
                    [license_number],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(hit.is_some())
        })
    }

    /// Step 2: license info. License numbers are unique across riders.
    pub fn insert_license(
        &self,
        id: Uuid,
        user_id: Uuid,
        req: &RiderLicenseRequest,
    ) -> Result<DriverLicense> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO driver_licenses (id, rider_id, license_number, license_photo_url,
                                              expiry_date, issued_date, issuing_authority,
                                              license_holder_name, date_of_birth)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    id.to_string(),
                    user_id.to_string(),
                    req.license_number,
                    req.license_photo_url,
                    req.expiry_date,
                    req.issued_date,
                    req.issuing_authority,
                    req.license_holder_name,
                    req.date_of_birth,
                ],
            )?;
            conn.query_row(
                &format!("SELECT {LICENSE_COLS} FROM driver_licenses dl WHERE dl.id = ?1"),
                [id.to_string()],
                |row| license_from_row_at(row, 0),
            )
            .map_err(Into::into)
        })
    }

    pub fn vehicle_for_user(&self, user_id: Uuid) -> Result<Option<Vehicle>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {VEHICLE_COLS} FROM vehicles v WHERE v.rider_id = ?1"),
                    [user_id.to_string()],
                    |row| vehicle_from_row_at(row, 0),
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn license_for_user(&self, user_id: Uuid) -> Result<Option<DriverLicense>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {LICENSE_COLS} FROM driver_licenses dl WHERE dl.rider_id = ?1"),
                    [user_id.to_string()],
                    |row| license_from_row_at(row, 0),
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Final step: link the vehicle and license onto the rider row and submit
    /// for verification.
    pub fn complete_rider_registration(
        &self,
        id: Uuid,
        user_id: Uuid,
        vehicle_id: Uuid,
        license_id: Uuid,
    ) -> Result<Rider> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO riders (id, user_id, vehicle_id, license_id, registration_status)
                 VALUES (?1, ?2, ?3, ?4, 'pending')
                 ON CONFLICT(user_id) DO UPDATE SET
                     vehicle_id = excluded.vehicle_id,
                     license_id = excluded.license_id,
                     updated_at = datetime('now')",
                rusqlite::params![
                    id.to_string(),
                    user_id.to_string(),
                    vehicle_id.to_string(),
                    license_id.to_string()
                ],
            )?;
            query_rider_by_user(conn, user_id)?
                .ok_or_else(|| anyhow::anyhow!("rider row missing after upsert"))
        })
    }

    pub fn rider_by_user(&self, user_id: Uuid) -> Result<Option<Rider>> {
        self.with_conn(|conn| query_rider_by_user(conn, user_id))
    }

    pub fn rider_by_id(&self, id: Uuid) -> Result<Option<Rider>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {RIDER_COLS} FROM riders r WHERE r.id = ?1"),
                    [id.to_string()],
                    rider_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// A rider approved for work and not deactivated by an admin.
    pub fn approved_rider_by_user(&self, user_id: Uuid) -> Result<Option<Rider>> {
        Ok(self
            .rider_by_user(user_id)?
            .filter(|r| r.registration_status == RegistrationStatus::Approved && r.is_active))
    }

    pub fn rider_profile(&self, user_id: Uuid) -> Result<Option<RiderProfile>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {RIDER_COLS}, {VEHICLE_COLS}, {LICENSE_COLS},
                                u.name, u.email, u.phone
                         FROM riders r
                         JOIN users u ON r.user_id = u.id
                         LEFT JOIN vehicles v ON r.vehicle_id = v.id
                         LEFT JOIN driver_licenses dl ON r.license_id = dl.id
                         WHERE r.user_id = ?1"
                    ),
                    [user_id.to_string()],
                    rider_profile_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Online/location update. The approval gate lives in the handler; this
    /// only touches the row.
    pub fn set_rider_presence(
        &self,
        user_id: Uuid,
        is_online: bool,
        location: Option<GeoPoint>,
    ) -> Result<Option<Rider>> {
        self.with_conn(|conn| {
            let changed = match location {
                Some(loc) => conn.execute(
                    "UPDATE riders SET is_online = ?1, current_latitude = ?2,
                            current_longitude = ?3, updated_at = datetime('now')
                     WHERE user_id = ?4",
                    rusqlite::params![is_online, loc.latitude, loc.longitude, user_id.to_string()],
                )?,
                None => conn.execute(
                    "UPDATE riders SET is_online = ?1, updated_at = datetime('now')
                     WHERE user_id = ?2",
                    rusqlite::params![is_online, user_id.to_string()],
                )?,
            };
            if changed == 0 {
                return Ok(None);
            }
            query_rider_by_user(conn, user_id)
        })
    }

    // -- Admin: rider verification --

    pub fn riders_admin(&self, status: Option<RegistrationStatus>) -> Result<Vec<RiderProfile>> {
        self.with_conn(|conn| {
            let mut sql = format!(
                "SELECT {RIDER_COLS}, {VEHICLE_COLS}, {LICENSE_COLS}, u.name, u.email, u.phone
                 FROM riders r
                 JOIN users u ON r.user_id = u.id
                 LEFT JOIN vehicles v ON r.vehicle_id = v.id
                 LEFT JOIN driver_licenses dl ON r.license_id = dl.id"
            );
            let mut params: Vec<Box<dyn ToSql>> = Vec::new();
            if let Some(status) = status {
                params.push(Box::new(status.as_str()));
                sql.push_str(" WHERE r.registration_status = ?1");
            }
            sql.push_str(" ORDER BY r.created_at DESC");

            let mut stmt = conn.prepare(&sql)?;
            let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
            let rows = stmt
                .query_map(param_refs.as_slice(), rider_profile_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Approval is guarded on the pending status; approving also clears a
    /// still-pending linked license in the same transaction.
    pub fn approve_rider(&self, id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE riders SET registration_status = 'approved',
                        approved_at = datetime('now'), updated_at = datetime('now')
                 WHERE id = ?1 AND registration_status = 'pending'",
                [id.to_string()],
            )?;
            if changed == 0 {
                return Ok(false);
            }
            tx.execute(
                "UPDATE driver_licenses SET verification_status = 'approved',
                        verified_at = datetime('now'), updated_at = datetime('now')
                 WHERE id = (SELECT license_id FROM riders WHERE id = ?1)
                   AND verification_status = 'pending'",
                [id.to_string()],
            )?;
            tx.commit()?;
            Ok(true)
        })
    }

    pub fn reject_rider(&self, id: Uuid, reason: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE riders SET registration_status = 'rejected', rejection_reason = ?1,
                        updated_at = datetime('now')
                 WHERE id = ?2",
                rusqlite::params![reason, id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Admin: license verification --

    pub fn pending_licenses(&self) -> Result<Vec<LicenseView>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LICENSE_COLS}, u.name, u.email, u.phone
                 FROM driver_licenses dl
                 JOIN users u ON dl.rider_id = u.id
                 WHERE dl.verification_status = 'pending'
                 ORDER BY dl.created_at DESC"
            ))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(LicenseView {
                        license: license_from_row_at(row, 0)?,
                        name: row.get(LICENSE_COL_COUNT)?,
                        email: row.get(LICENSE_COL_COUNT + 1)?,
                        phone: row.get(LICENSE_COL_COUNT + 2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn approve_license(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE driver_licenses SET verification_status = 'approved',
                        verified_at = datetime('now'), updated_at = datetime('now')
                 WHERE id = ?1",
                [id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn reject_license(&self, id: Uuid, reason: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE driver_licenses SET verification_status = 'rejected',
                        rejection_reason = ?1, verified_at = datetime('now'),
                        updated_at = datetime('now')
                 WHERE id = ?2",
                rusqlite::params![reason, id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }
}

fn query_rider_by_user(conn: &rusqlite::Connection, user_id: Uuid) -> Result<Option<Rider>> {
    let row = conn
        .query_row(
            &format!("SELECT {RIDER_COLS} FROM riders r WHERE r.user_id = ?1"),
            [user_id.to_string()],
            rider_from_row,
        )
        .optional()?;
    Ok(row)
}

fn rider_profile_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RiderProfile> {
    let vehicle_base = RIDER_COL_COUNT;
    let license_base = vehicle_base + VEHICLE_COL_COUNT;
    let user_base = license_base + LICENSE_COL_COUNT;
    Ok(RiderProfile {
        rider: rider_from_row(row)?,
        vehicle: vehicle_opt_from_row_at(row, vehicle_base)?,
        license: license_opt_from_row_at(row, license_base)?,
        name: row.get(user_base)?,
        email: row.get(user_base + 1)?,
        phone: row.get(user_base + 2)?,
    })
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use mela_types::api::RiderPersonalRequest;
    use mela_types::models::{GeoPoint, RegistrationStatus, UserType};

    use crate::test_support::{db, seed_approved_rider, seed_user, seed_user_with_phone};

    #[test]
    fn registration_walks_to_approved() {
        let db = db();
        let user = seed_user_with_phone(&db, UserType::User);
        let rider_id = seed_approved_rider(&db, user);

        let rider = db.rider_by_id(rider_id).unwrap().unwrap();
        assert_eq!(rider.registration_status, RegistrationStatus::Approved);
        assert!(rider.approved_at.is_some());

        let profile = db.rider_profile(user).unwrap().unwrap();
        assert!(profile.vehicle.is_some());
        assert!(profile.license.is_some());
        // The linked license was approved alongside the rider.
        assert_eq!(
            profile.license.unwrap().verification_status,
            RegistrationStatus::Approved
        );
    }

    #[test]
    fn approve_is_guarded_on_pending() {
        let db = db();
        let user = seed_user_with_phone(&db, UserType::User);
        let rider_id = seed_approved_rider(&db, user);

        // Already approved: the guard matches zero rows.
        assert!(!db.approve_rider(rider_id).unwrap());
    }

    #[test]
    fn unapproved_riders_are_filtered_out() {
        let db = db();
        let user = seed_user(&db, UserType::User, true);
        db.upsert_rider_personal(
            Uuid::new_v4(),
            user,
            &RiderPersonalRequest {
                profile_photo_url: Some("https://cdn.example.com/p.jpg".into()),
                emergency_contact: Some("9811111111".into()),
                nid_number: None,
                bank_name: None,
                account_number: None,
                account_holder_name: None,
                terms_accepted: Some(true),
            },
        )
        .unwrap();

        assert!(db.rider_by_user(user).unwrap().is_some());
        assert!(db.approved_rider_by_user(user).unwrap().is_none());
    }

    #[test]
    fn rejection_records_the_reason() {
        let db = db();
        let user = seed_user_with_phone(&db, UserType::User);
        let rider_id = seed_approved_rider(&db, user);

        assert!(db.reject_rider(rider_id, "blurry license photo").unwrap());
        let rider = db.rider_by_id(rider_id).unwrap().unwrap();
        assert_eq!(rider.registration_status, RegistrationStatus::Rejected);
        assert_eq!(
            rider.rejection_reason.as_deref(),
            Some("blurry license photo")
        );
    }

    #[test]
    fn presence_update_stores_the_location() {
        let db = db();
        let user = seed_user_with_phone(&db, UserType::User);
        seed_approved_rider(&db, user);

        let rider = db
            .set_rider_presence(
                user,
                true,
                Some(GeoPoint {
                    latitude: 27.7,
                    longitude: 85.3,
                }),
            )
            .unwrap()
            .unwrap();
        assert!(rider.is_online);
        assert_eq!(rider.current_latitude, Some(27.7));

        // No rider row -> no update.
        let stranger = seed_user(&db, UserType::User, true);
        assert!(db.set_rider_presence(stranger, true, None).unwrap().is_none());
    }
}
