//! Postgres-backed shipment storage via SQLx.
//!
//! Claims and status changes are single `UPDATE … WHERE … RETURNING`
//! statements. The `WHERE` clause carries the expected prior state, so with
//! several replicas racing on the same row exactly one statement matches.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;
use uuid::Uuid;

use crate::engine::status::INITIAL;
use crate::geo::Coordinates;
use crate::models::shipment::{
    PackageAttributes, ResolvedAddress, Shipment, ShipmentDraft, ShipmentId,
    ShipmentReplacement, ShipmentStatus,
};
use crate::repository::{RepositoryError, ShipmentFilter, ShipmentRepository};

macro_rules! shipment_columns {
    () => {
        "id, sender_id, recipient_id, recipient_email, courier_id, status, \
         origin, origin_lat, origin_lon, destination, dest_lat, dest_lon, \
         weight, length, width, height, fragile, created_at, last_updated"
    };
}

/// Connects the pool and applies embedded migrations.
pub async fn connect(
    url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool, RepositoryError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(acquire_timeout)
        .connect(url)
        .await
        .map_err(map_sqlx_error)?;

    info!(max_connections, "connected to postgres");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|err| RepositoryError::Query(format!("migration failed: {err}")))?;
    info!("database migrations applied");

    Ok(pool)
}

pub struct PgShipmentRepository {
    pool: PgPool,
}

impl PgShipmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShipmentRepository for PgShipmentRepository {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn insert(&self, draft: ShipmentDraft) -> Result<Shipment, RepositoryError> {
        let row = sqlx::query_as::<_, ShipmentRow>(concat!(
            "INSERT INTO shipments (sender_id, recipient_id, recipient_email, courier_id, status, \
             origin, origin_lat, origin_lon, destination, dest_lat, dest_lon, \
             weight, length, width, height, fragile) \
             VALUES ($1, $2, $3, NULL, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             RETURNING ",
            shipment_columns!()
        ))
        .bind(draft.sender_id)
        .bind(draft.recipient_id)
        .bind(&draft.recipient_email)
        .bind(INITIAL.as_str())
        .bind(&draft.origin.address)
        .bind(draft.origin.coordinates.lat)
        .bind(draft.origin.coordinates.lon)
        .bind(&draft.destination.address)
        .bind(draft.destination.coordinates.lat)
        .bind(draft.destination.coordinates.lon)
        .bind(draft.package.weight)
        .bind(draft.package.length)
        .bind(draft.package.width)
        .bind(draft.package.height)
        .bind(draft.package.fragile)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.into_shipment()
    }

    async fn get(&self, id: ShipmentId) -> Result<Option<Shipment>, RepositoryError> {
        let row = sqlx::query_as::<_, ShipmentRow>(concat!(
            "SELECT ",
            shipment_columns!(),
            " FROM shipments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(ShipmentRow::into_shipment).transpose()
    }

    async fn find_for_recipient(
        &self,
        id: ShipmentId,
        recipient_email: &str,
    ) -> Result<Option<Shipment>, RepositoryError> {
        let row = sqlx::query_as::<_, ShipmentRow>(concat!(
            "SELECT ",
            shipment_columns!(),
            " FROM shipments WHERE id = $1 AND recipient_email = $2"
        ))
        .bind(id)
        .bind(recipient_email)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(ShipmentRow::into_shipment).transpose()
    }

    async fn list(&self, filter: ShipmentFilter) -> Result<Vec<Shipment>, RepositoryError> {
        let rows = match filter {
            ShipmentFilter::All => {
                sqlx::query_as::<_, ShipmentRow>(concat!(
                    "SELECT ",
                    shipment_columns!(),
                    " FROM shipments ORDER BY id"
                ))
                .fetch_all(&self.pool)
                .await
            }
            ShipmentFilter::Courier(courier_id) => {
                sqlx::query_as::<_, ShipmentRow>(concat!(
                    "SELECT ",
                    shipment_columns!(),
                    " FROM shipments WHERE courier_id = $1 ORDER BY id"
                ))
                .bind(courier_id)
                .fetch_all(&self.pool)
                .await
            }
            ShipmentFilter::Sender(sender_id) => {
                sqlx::query_as::<_, ShipmentRow>(concat!(
                    "SELECT ",
                    shipment_columns!(),
                    " FROM shipments WHERE sender_id = $1 ORDER BY id"
                ))
                .bind(sender_id)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(ShipmentRow::into_shipment).collect()
    }

    async fn claim(
        &self,
        id: ShipmentId,
        courier_id: Uuid,
    ) -> Result<Option<Shipment>, RepositoryError> {
        let row = sqlx::query_as::<_, ShipmentRow>(concat!(
            "UPDATE shipments SET courier_id = $2, last_updated = now() \
             WHERE id = $1 AND courier_id IS NULL RETURNING ",
            shipment_columns!()
        ))
        .bind(id)
        .bind(courier_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(ShipmentRow::into_shipment).transpose()
    }

    async fn transition_status(
        &self,
        id: ShipmentId,
        courier_id: Uuid,
        from: ShipmentStatus,
        to: ShipmentStatus,
    ) -> Result<Option<Shipment>, RepositoryError> {
        let row = sqlx::query_as::<_, ShipmentRow>(concat!(
            "UPDATE shipments SET status = $4, last_updated = now() \
             WHERE id = $1 AND courier_id = $2 AND status = $3 RETURNING ",
            shipment_columns!()
        ))
        .bind(id)
        .bind(courier_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(ShipmentRow::into_shipment).transpose()
    }

    async fn replace(
        &self,
        id: ShipmentId,
        replacement: ShipmentReplacement,
    ) -> Result<Option<Shipment>, RepositoryError> {
        let row = sqlx::query_as::<_, ShipmentRow>(concat!(
            "UPDATE shipments SET recipient_id = $2, recipient_email = $3, \
             origin = $4, origin_lat = $5, origin_lon = $6, \
             destination = $7, dest_lat = $8, dest_lon = $9, \
             weight = $10, length = $11, width = $12, height = $13, fragile = $14, \
             last_updated = now() \
             WHERE id = $1 RETURNING ",
            shipment_columns!()
        ))
        .bind(id)
        .bind(replacement.recipient_id)
        .bind(&replacement.recipient_email)
        .bind(&replacement.origin.address)
        .bind(replacement.origin.coordinates.lat)
        .bind(replacement.origin.coordinates.lon)
        .bind(&replacement.destination.address)
        .bind(replacement.destination.coordinates.lat)
        .bind(replacement.destination.coordinates.lon)
        .bind(replacement.package.weight)
        .bind(replacement.package.length)
        .bind(replacement.package.width)
        .bind(replacement.package.height)
        .bind(replacement.package.fragile)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(ShipmentRow::into_shipment).transpose()
    }

    async fn delete(&self, id: ShipmentId) -> Result<Option<Shipment>, RepositoryError> {
        let row = sqlx::query_as::<_, ShipmentRow>(concat!(
            "DELETE FROM shipments WHERE id = $1 RETURNING ",
            shipment_columns!()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(ShipmentRow::into_shipment).transpose()
    }
}

pub(crate) fn map_sqlx_error(err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => RepositoryError::Connection(err.to_string()),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            RepositoryError::Decode(err.to_string())
        }
        other => RepositoryError::Query(other.to_string()),
    }
}

#[derive(sqlx::FromRow)]
struct ShipmentRow {
    id: i64,
    sender_id: Uuid,
    recipient_id: Option<Uuid>,
    recipient_email: Option<String>,
    courier_id: Option<Uuid>,
    status: String,
    origin: String,
    origin_lat: f64,
    origin_lon: f64,
    destination: String,
    dest_lat: f64,
    dest_lon: f64,
    weight: f64,
    length: Option<f64>,
    width: Option<f64>,
    height: Option<f64>,
    fragile: bool,
    created_at: DateTime<Utc>,
    last_updated: DateTime<Utc>,
}

impl ShipmentRow {
    fn into_shipment(self) -> Result<Shipment, RepositoryError> {
        let status = self
            .status
            .parse::<ShipmentStatus>()
            .map_err(|err| RepositoryError::Decode(format!("shipment {}: {err}", self.id)))?;

        Ok(Shipment {
            id: self.id,
            sender_id: self.sender_id,
            recipient_id: self.recipient_id,
            recipient_email: self.recipient_email,
            courier_id: self.courier_id,
            status,
            origin: ResolvedAddress {
                address: self.origin,
                coordinates: Coordinates::new(self.origin_lat, self.origin_lon),
            },
            destination: ResolvedAddress {
                address: self.destination,
                coordinates: Coordinates::new(self.dest_lat, self.dest_lon),
            },
            package: PackageAttributes {
                weight: self.weight,
                length: self.length,
                width: self.width,
                height: self.height,
                fragile: self.fragile,
            },
            created_at: self.created_at,
            last_updated: self.last_updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str) -> ShipmentRow {
        ShipmentRow {
            id: 3,
            sender_id: Uuid::nil(),
            recipient_id: None,
            recipient_email: Some("jan@example.com".to_string()),
            courier_id: None,
            status: status.to_string(),
            origin: "Warszawa".to_string(),
            origin_lat: 52.2297,
            origin_lon: 21.0122,
            destination: "Olsztyn".to_string(),
            dest_lat: 53.7784,
            dest_lon: 20.4801,
            weight: 2.0,
            length: None,
            width: None,
            height: Some(10.0),
            fragile: true,
            created_at: Utc::now(),
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn row_maps_cached_addresses_without_recomputing() {
        let shipment = row("out_for_delivery").into_shipment().unwrap();
        assert_eq!(shipment.status, ShipmentStatus::OutForDelivery);
        assert_eq!(shipment.origin.address, "Warszawa");
        assert_eq!(
            shipment.destination.coordinates,
            Coordinates::new(53.7784, 20.4801)
        );
        assert_eq!(shipment.package.height, Some(10.0));
        assert!(shipment.package.fragile);
    }

    #[test]
    fn unknown_status_is_a_decode_error() {
        let err = row("pending").into_shipment().unwrap_err();
        assert!(matches!(err, RepositoryError::Decode(_)));
    }

    #[test]
    fn pool_timeouts_are_connection_errors() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            RepositoryError::Connection(_)
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            RepositoryError::Query(_)
        ));
    }
}
