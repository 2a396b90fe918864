use anyhow::Result;
use chrono::{DateTime, Utc, Weekday};
use rusqlite::{OptionalExtension, Row, types::ToSql};
use uuid::Uuid;

use mela_geo::haversine_km;
use mela_types::api::EarningsSummary;
use mela_types::models::{
    CancelActor, GeoPoint, RideOffer, RideRequest, RideStatus, RideView, VehicleType,
};

use crate::Database;
use crate::models::{OFFER_COLS, RIDE_COL_COUNT, RIDE_COLS, offer_from_row, ride_from_row};

/// Counterparty display columns appended after the ride columns: the
/// assigned rider's name, their vehicle, and the passenger's name.
const VIEW_COLS: &str = "ru.name, v.make, v.model, v.color, v.license_plate, pu.name";

const VIEW_JOINS: &str = "LEFT JOIN riders r ON rr.rider_id = r.id
     LEFT JOIN users ru ON r.user_id = ru.id
     LEFT JOIN vehicles v ON r.vehicle_id = v.id
     JOIN users pu ON rr.user_id = pu.id";

fn ride_view_from_row(row: &Row<'_>) -> rusqlite::Result<RideView> {
    let base = RIDE_COL_COUNT;
    Ok(RideView {
        ride: ride_from_row(row)?,
        rider_name: row.get(base)?,
        vehicle_make: row.get(base + 1)?,
        vehicle_model: row.get(base + 2)?,
        vehicle_color: row.get(base + 3)?,
        license_plate: row.get(base + 4)?,
        passenger_name: row.get(base + 5)?,
    })
}

impl Database {
    #[allow(clippy::too_many_arguments)]
    pub fn insert_ride_request(
        &self,
        id: Uuid,
        user_id: Uuid,
        pickup: GeoPoint,
        pickup_address: &str,
        dropoff: GeoPoint,
        dropoff_address: &str,
        distance_km: f64,
        estimated_price: f64,
        user_phone: &str,
        notes: Option<&str>,
        vehicle_type: VehicleType,
    ) -> Result<RideRequest> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO ride_requests
                     (id, user_id, pickup_latitude, pickup_longitude, pickup_address,
                      dropoff_latitude, dropoff_longitude, dropoff_address, distance_km,
                      estimated_price, user_phone, notes, vehicle_type, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 'pending')",
                rusqlite::params![
                    id.to_string(),
                    user_id.to_string(),
                    pickup.latitude,
                    pickup.longitude,
                    pickup_address,
                    dropoff.latitude,
                    dropoff.longitude,
                    dropoff_address,
                    distance_km,
                    estimated_price,
                    user_phone,
                    notes,
                    vehicle_type.as_str(),
                ],
            )?;
            query_ride(conn, id)?.ok_or_else(|| anyhow::anyhow!("ride row missing after insert"))
        })
    }

    pub fn ride_by_id(&self, id: Uuid) -> Result<Option<RideRequest>> {
        self.with_conn(|conn| query_ride(conn, id))
    }

    /// Pending requests whose pickup lies within `radius_km` of the rider,
    /// nearest first.
    pub fn nearby_pending_requests(
        &self,
        center: GeoPoint,
        radius_km: f64,
        limit: usize,
    ) -> Result<Vec<RideView>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RIDE_COLS}, {VIEW_COLS} FROM ride_requests rr
                 {VIEW_JOINS}
                 WHERE rr.status = 'pending'"
            ))?;
            let rows = stmt
                .query_map([], ride_view_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut nearby: Vec<(f64, RideView)> = rows
                .into_iter()
                .map(|view| (haversine_km(center, view.ride.pickup), view))
                .filter(|(d, _)| *d <= radius_km)
                .collect();
            nearby.sort_by(|a, b| a.0.total_cmp(&b.0));

            Ok(nearby.into_iter().take(limit).map(|(_, v)| v).collect())
        })
    }

    /// Guarded transition pending -> accepted. Returns the updated ride, or
    /// None when the request is gone or was already claimed.
    pub fn accept_ride(
        &self,
        id: Uuid,
        rider_id: Uuid,
        rider_phone: &str,
    ) -> Result<Option<RideRequest>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE ride_requests
                 SET rider_id = ?1, status = 'accepted', rider_phone = ?2,
                     accepted_at = datetime('now'), updated_at = datetime('now')
                 WHERE id = ?3 AND status = 'pending'",
                rusqlite::params![rider_id.to_string(), rider_phone, id.to_string()],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_ride(conn, id)
        })
    }

    // -- Offers --

    pub fn insert_offer(
        &self,
        id: Uuid,
        ride_request_id: Uuid,
        rider_id: Uuid,
        offered_price: f64,
    ) -> Result<RideOffer> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO ride_offers (id, ride_request_id, rider_id, offered_price, status)
                 VALUES (?1, ?2, ?3, ?4, 'pending')",
                rusqlite::params![
                    id.to_string(),
                    ride_request_id.to_string(),
                    rider_id.to_string(),
                    offered_price
                ],
            )?;
            conn.query_row(
                &format!("SELECT {OFFER_COLS} FROM ride_offers ro WHERE ro.id = ?1"),
                [id.to_string()],
                offer_from_row,
            )
            .map_err(Into::into)
        })
    }

    /// A pending offer joined with the owning request's passenger, for the
    /// accept-offer authorization check.
    pub fn pending_offer(&self, id: Uuid) -> Result<Option<(RideOffer, Uuid)>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {OFFER_COLS}, rr.user_id
                         FROM ride_offers ro
                         JOIN ride_requests rr ON ro.ride_request_id = rr.id
                         WHERE ro.id = ?1 AND ro.status = 'pending'"
                    ),
                    [id.to_string()],
                    |row| {
                        let offer = offer_from_row(row)?;
                        let user_id = crate::convert::get_uuid(row, 6)?;
                        Ok((offer, user_id))
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Passenger accepts a rider's counter-offer: assigns the rider at the
    /// offered price and marks the offer accepted, atomically. Guarded on the
    /// request still being pending, so a ride never gets a second rider.
    pub fn accept_offer(&self, offer: &RideOffer, rider_phone: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE ride_requests
                 SET rider_id = ?1, status = 'accepted', rider_phone = ?2,
                     requested_price = ?3, accepted_at = datetime('now'),
                     updated_at = datetime('now')
                 WHERE id = ?4 AND status = 'pending'",
                rusqlite::params![
                    offer.rider_id.to_string(),
                    rider_phone,
                    offer.offered_price,
                    offer.ride_request_id.to_string()
                ],
            )?;
            if changed == 0 {
                return Ok(false);
            }
            tx.execute(
                "UPDATE ride_offers SET status = 'accepted', updated_at = datetime('now')
                 WHERE id = ?1",
                [offer.id.to_string()],
            )?;
            tx.commit()?;
            Ok(true)
        })
    }

    // -- Listings --

    pub fn rides_for_passenger(
        &self,
        user_id: Uuid,
        status: Option<RideStatus>,
    ) -> Result<Vec<RideView>> {
        self.with_conn(|conn| {
            let mut sql = format!(
                "SELECT {RIDE_COLS}, {VIEW_COLS} FROM ride_requests rr
                 {VIEW_JOINS}
                 WHERE rr.user_id = ?1"
            );
            let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(user_id.to_string())];
            if let Some(status) = status {
                params.push(Box::new(status.as_str()));
                sql.push_str(" AND rr.status = ?2");
            }
            sql.push_str(" ORDER BY rr.created_at DESC LIMIT 50");

            let mut stmt = conn.prepare(&sql)?;
            let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
            let rows = stmt
                .query_map(param_refs.as_slice(), ride_view_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Full detail, visible only to the passenger or the assigned rider.
    pub fn ride_view_for_participant(&self, id: Uuid, user_id: Uuid) -> Result<Option<RideView>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {RIDE_COLS}, {VIEW_COLS} FROM ride_requests rr
                         {VIEW_JOINS}
                         WHERE rr.id = ?1
                           AND (rr.user_id = ?2
                                OR rr.rider_id = (SELECT id FROM riders WHERE user_id = ?2))"
                    ),
                    [id.to_string(), user_id.to_string()],
                    ride_view_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// The ride plus the assigned rider's user id, for cancel authorization.
    pub fn ride_with_rider_user(&self, id: Uuid) -> Result<Option<(RideRequest, Option<Uuid>)>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {RIDE_COLS}, r.user_id FROM ride_requests rr
                         LEFT JOIN riders r ON rr.rider_id = r.id
                         WHERE rr.id = ?1"
                    ),
                    [id.to_string()],
                    |row| {
                        let ride = ride_from_row(row)?;
                        let rider_user = crate::convert::get_opt_uuid(row, RIDE_COL_COUNT)?;
                        Ok((ride, rider_user))
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Cancellation escape hatch: allowed from any non-terminal status,
    /// tagged with the cancelling actor.
    pub fn cancel_ride(&self, id: Uuid, by: CancelActor, reason: Option<&str>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE ride_requests
                 SET status = ?1, cancellation_reason = ?2,
                     cancelled_at = datetime('now'), updated_at = datetime('now')
                 WHERE id = ?3 AND status IN ('pending', 'accepted', 'in_progress')",
                rusqlite::params![by.cancelled_status().as_str(), reason, id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }

    /// Guarded transition accepted -> in_progress, by the assigned rider.
    pub fn start_ride(&self, id: Uuid, rider_id: Uuid) -> Result<Option<RideRequest>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE ride_requests
                 SET status = 'in_progress', started_at = datetime('now'),
                     updated_at = datetime('now')
                 WHERE id = ?1 AND rider_id = ?2 AND status = 'accepted'",
                [id.to_string(), rider_id.to_string()],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_ride(conn, id)
        })
    }

    /// Guarded transition in_progress -> completed, atomic with the rider's
    /// totals so a crash between the two writes cannot leave them skewed.
    /// Returns the fare, or None when the ride was not in progress (a repeat
    /// call affects zero rows).
    pub fn complete_ride(&self, id: Uuid, rider_id: Uuid) -> Result<Option<f64>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let fare: Option<f64> = tx
                .query_row(
                    "SELECT COALESCE(requested_price, estimated_price)
                     FROM ride_requests
                     WHERE id = ?1 AND rider_id = ?2 AND status = 'in_progress'",
                    [id.to_string(), rider_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(fare) = fare else {
                return Ok(None);
            };

            tx.execute(
                "UPDATE ride_requests
                 SET status = 'completed', completed_at = datetime('now'),
                     updated_at = datetime('now')
                 WHERE id = ?1 AND status = 'in_progress'",
                [id.to_string()],
            )?;
            tx.execute(
                "UPDATE riders
                 SET total_rides = total_rides + 1, total_earnings = total_earnings + ?1,
                     updated_at = datetime('now')
                 WHERE id = ?2",
                rusqlite::params![fare, rider_id.to_string()],
            )?;

            tx.commit()?;
            Ok(Some(fare))
        })
    }

    pub fn active_rides_for_rider(&self, rider_id: Uuid) -> Result<Vec<RideView>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RIDE_COLS}, {VIEW_COLS} FROM ride_requests rr
                 {VIEW_JOINS}
                 WHERE rr.rider_id = ?1 AND rr.status IN ('accepted', 'in_progress')
                 ORDER BY rr.updated_at DESC"
            ))?;
            let rows = stmt
                .query_map([rider_id.to_string()], ride_view_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn rides_for_rider_user(&self, user_id: Uuid) -> Result<Vec<RideView>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RIDE_COLS}, {VIEW_COLS} FROM ride_requests rr
                 {VIEW_JOINS}
                 WHERE rr.rider_id = (SELECT id FROM riders WHERE user_id = ?1)
                 ORDER BY rr.created_at DESC"
            ))?;
            let rows = stmt
                .query_map([user_id.to_string()], ride_view_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Earnings rollup over completed rides; the fare of each ride is the
    /// renegotiated price when present, else the original estimate.
    pub fn rider_earnings(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<EarningsSummary> {
        let completed: Vec<(Option<DateTime<Utc>>, f64)> = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT rr.completed_at, COALESCE(rr.requested_price, rr.estimated_price)
                 FROM ride_requests rr
                 WHERE rr.rider_id = (SELECT id FROM riders WHERE user_id = ?1)
                   AND rr.status = 'completed'",
            )?;
            let rows = stmt
                .query_map([user_id.to_string()], |row| {
                    Ok((crate::convert::get_opt_ts(row, 0)?, row.get::<_, f64>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        let today = now.date_naive();
        let week_start = today.week(Weekday::Mon).first_day();

        let mut summary = EarningsSummary {
            today: 0.0,
            this_week: 0.0,
            total: 0.0,
            completed_count: completed.len() as i64,
        };
        for (completed_at, fare) in completed {
            summary.total += fare;
            if let Some(ts) = completed_at {
                let day = ts.date_naive();
                if day == today {
                    summary.today += fare;
                }
                if day >= week_start {
                    summary.this_week += fare;
                }
            }
        }
        Ok(summary)
    }
}

fn query_ride(conn: &rusqlite::Connection, id: Uuid) -> Result<Option<RideRequest>> {
    let row = conn
        .query_row(
            &format!("SELECT {RIDE_COLS} FROM ride_requests rr WHERE rr.id = ?1"),
            [id.to_string()],
            ride_from_row,
        )
        .optional()?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use mela_types::models::{CancelActor, GeoPoint, RideStatus, UserType};

    use crate::Database;
    use crate::test_support::{db, seed_approved_rider, seed_user_with_phone};

    const THAMEL: GeoPoint = GeoPoint {
        latitude: 27.7154,
        longitude: 85.3123,
    };
    const AIRPORT: GeoPoint = GeoPoint {
        latitude: 27.6966,
        longitude: 85.3591,
    };

    fn seed_request(db: &Database, passenger: Uuid) -> Uuid {
        let distance = mela_geo::haversine_km(THAMEL, AIRPORT);
        let price = mela_geo::ride_price(distance, mela_types::models::VehicleType::Sedan);
        db.insert_ride_request(
            Uuid::new_v4(),
            passenger,
            THAMEL,
            "Thamel, Kathmandu",
            AIRPORT,
            "Tribhuvan International Airport",
            distance,
            price,
            "9800000000",
            None,
            mela_types::models::VehicleType::Sedan,
        )
        .unwrap()
        .id
    }

    #[test]
    fn accept_is_first_wins() {
        let db = db();
        let passenger = seed_user_with_phone(&db, UserType::User);
        let rider_a = seed_approved_rider(&db, seed_user_with_phone(&db, UserType::User));
        let rider_b = seed_approved_rider(&db, seed_user_with_phone(&db, UserType::User));
        let ride = seed_request(&db, passenger);

        let accepted = db.accept_ride(ride, rider_a, "9811111111").unwrap();
        assert_eq!(accepted.unwrap().status, RideStatus::Accepted);

        // Second rider loses the race: the guard matches zero rows.
        assert!(db.accept_ride(ride, rider_b, "9822222222").unwrap().is_none());
        let row = db.ride_by_id(ride).unwrap().unwrap();
        assert_eq!(row.rider_id, Some(rider_a));
    }

    #[test]
    fn completion_is_transactional_and_single_shot() {
        let db = db();
        let passenger = seed_user_with_phone(&db, UserType::User);
        let rider_user = seed_user_with_phone(&db, UserType::User);
        let rider = seed_approved_rider(&db, rider_user);
        let ride = seed_request(&db, passenger);

        db.accept_ride(ride, rider, "9811111111").unwrap().unwrap();

        // Cannot complete before starting.
        assert!(db.complete_ride(ride, rider).unwrap().is_none());

        db.start_ride(ride, rider).unwrap().unwrap();
        let fare = db.complete_ride(ride, rider).unwrap().unwrap();

        let row = db.ride_by_id(ride).unwrap().unwrap();
        assert_eq!(row.status, RideStatus::Completed);
        assert_eq!(fare, row.estimated_price);

        let totals = db.rider_by_id(rider).unwrap().unwrap();
        assert_eq!(totals.total_rides, 1);
        assert_eq!(totals.total_earnings, fare);

        // Completing again affects zero rows and changes nothing.
        assert!(db.complete_ride(ride, rider).unwrap().is_none());
        let totals = db.rider_by_id(rider).unwrap().unwrap();
        assert_eq!(totals.total_rides, 1);
    }

    #[test]
    fn accepted_offer_sets_the_negotiated_fare() {
        let db = db();
        let passenger = seed_user_with_phone(&db, UserType::User);
        let rider = seed_approved_rider(&db, seed_user_with_phone(&db, UserType::User));
        let ride = seed_request(&db, passenger);

        let offer = db.insert_offer(Uuid::new_v4(), ride, rider, 420.0).unwrap();
        let (pending, owner) = db.pending_offer(offer.id).unwrap().unwrap();
        assert_eq!(owner, passenger);

        assert!(db.accept_offer(&pending, "9811111111").unwrap());
        let row = db.ride_by_id(ride).unwrap().unwrap();
        assert_eq!(row.status, RideStatus::Accepted);
        assert_eq!(row.requested_price, Some(420.0));
        assert_eq!(row.fare(), 420.0);

        // The offer left the pending set.
        assert!(db.pending_offer(offer.id).unwrap().is_none());
    }

    #[test]
    fn cancellation_is_tagged_and_blocked_on_terminal_rides() {
        let db = db();
        let passenger = seed_user_with_phone(&db, UserType::User);
        let rider = seed_approved_rider(&db, seed_user_with_phone(&db, UserType::User));
        let ride = seed_request(&db, passenger);

        assert!(db.cancel_ride(ride, CancelActor::Passenger, Some("changed plans")).unwrap());
        let row = db.ride_by_id(ride).unwrap().unwrap();
        assert_eq!(row.status, RideStatus::PassengerCancelled);
        assert_eq!(row.cancellation_reason.as_deref(), Some("changed plans"));

        // Already terminal: a second cancel (either actor) matches nothing.
        assert!(!db.cancel_ride(ride, CancelActor::Rider, None).unwrap());

        // Completed rides cannot be cancelled either.
        let ride2 = seed_request(&db, passenger);
        db.accept_ride(ride2, rider, "9811111111").unwrap().unwrap();
        db.start_ride(ride2, rider).unwrap().unwrap();
        db.complete_ride(ride2, rider).unwrap().unwrap();
        assert!(!db.cancel_ride(ride2, CancelActor::Rider, None).unwrap());
    }

    #[test]
    fn nearby_requests_are_radius_bound_and_sorted() {
        let db = db();
        let passenger = seed_user_with_phone(&db, UserType::User);
        let close = seed_request(&db, passenger);

        // A pickup in another city entirely.
        let far = db
            .insert_ride_request(
                Uuid::new_v4(),
                passenger,
                GeoPoint { latitude: 28.2096, longitude: 83.9856 },
                "Lakeside, Pokhara",
                AIRPORT,
                "Tribhuvan International Airport",
                200.0,
                1500.0,
                "9800000000",
                None,
                mela_types::models::VehicleType::Sedan,
            )
            .unwrap()
            .id;

        let found = db.nearby_pending_requests(THAMEL, 10.0, 20).unwrap();
        let ids: Vec<Uuid> = found.iter().map(|v| v.ride.id).collect();
        assert!(ids.contains(&close));
        assert!(!ids.contains(&far));
        assert!(found.iter().all(|v| v.passenger_name.is_some()));
    }

    #[test]
    fn earnings_rollup_counts_completed_rides_once() {
        let db = db();
        let passenger = seed_user_with_phone(&db, UserType::User);
        let rider_user = seed_user_with_phone(&db, UserType::User);
        let rider = seed_approved_rider(&db, rider_user);

        let ride = seed_request(&db, passenger);
        db.accept_ride(ride, rider, "9811111111").unwrap().unwrap();
        db.start_ride(ride, rider).unwrap().unwrap();
        let fare = db.complete_ride(ride, rider).unwrap().unwrap();

        let summary = db.rider_earnings(rider_user, Utc::now()).unwrap();
        assert_eq!(summary.completed_count, 1);
        assert_eq!(summary.total, fare);
        assert_eq!(summary.today, fare);
        assert_eq!(summary.this_week, fare);
    }
}
