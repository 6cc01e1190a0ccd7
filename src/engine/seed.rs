//! Demo data: one sender, one courier, and a handful of shipments between
//! Polish cities, all claimed by the courier.

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::directory::{DirectoryUser, UserDirectory};
use crate::engine::service::ShipmentService;
use crate::error::AppError;
use crate::models::actor::{is_allowed, Actor, Role};
use crate::models::shipment::{Location, NewShipment, PackageAttributes, ShipmentId};

pub const DEMO_SENDER_EMAIL: &str = "sender@example.com";
pub const DEMO_COURIER_EMAIL: &str = "courier@example.com";
const DEMO_RECIPIENT_EMAIL: &str = "example@example.com";

/// (origin city, destination city, weight in kg)
const DEMO_ROUTES: &[(&str, &str, f64)] = &[
    ("Warszawa", "Olsztyn", 100.0),
    ("Olsztyn", "Lodz", 50.0),
    ("Poznan", "Warszawa", 100.0),
    ("Krakow", "Bialystok", 50.0),
    ("Lodz", "Poznan", 56.0),
];

#[derive(Debug, Clone, Serialize)]
pub struct SeedReport {
    pub sender_id: Uuid,
    pub courier_id: Uuid,
    pub shipment_ids: Vec<ShipmentId>,
}

/// Seeds sequentially so geocoding stays within the provider's rate limit.
/// Users are reused across runs; shipments are created anew each time.
pub async fn seed_demo_data(
    service: &ShipmentService,
    users: &dyn UserDirectory,
    caller: &Actor,
) -> Result<SeedReport, AppError> {
    if !is_allowed(caller.role, &[]) {
        return Err(AppError::Forbidden("seeding requires the admin role".to_string()));
    }

    let sender = users
        .register(DirectoryUser {
            id: Uuid::new_v4(),
            role: Role::Sender,
            email: Some(DEMO_SENDER_EMAIL.to_string()),
        })
        .await?;
    let courier = users
        .register(DirectoryUser {
            id: Uuid::new_v4(),
            role: Role::Courier,
            email: Some(DEMO_COURIER_EMAIL.to_string()),
        })
        .await?;

    let sender_actor = Actor::new(sender.id, sender.role);
    let mut shipment_ids = Vec::with_capacity(DEMO_ROUTES.len());

    for (origin, destination, weight) in DEMO_ROUTES {
        let shipment = service
            .add_shipment(
                &sender_actor,
                NewShipment {
                    origin: Location::city(origin),
                    destination: Location::city(destination),
                    recipient_email: Some(DEMO_RECIPIENT_EMAIL.to_string()),
                    recipient_id: None,
                    package: PackageAttributes {
                        weight: *weight,
                        ..PackageAttributes::default()
                    },
                },
            )
            .await?;
        service
            .assign_shipment_to_courier(caller, shipment.id, courier.id)
            .await?;
        shipment_ids.push(shipment.id);
    }

    info!(
        sender_id = %sender.id,
        courier_id = %courier.id,
        shipments = shipment_ids.len(),
        "demo data seeded"
    );

    Ok(SeedReport {
        sender_id: sender.id,
        courier_id: courier.id,
        shipment_ids,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::directory::InMemoryUserDirectory;
    use crate::geo::gazetteer::Gazetteer;
    use crate::geo::resolver::AddressResolver;
    use crate::models::shipment::ShipmentStatus;
    use crate::notify::BroadcastNotifier;
    use crate::observability::metrics::Metrics;
    use crate::repository::memory::InMemoryShipmentRepository;

    fn setup() -> (ShipmentService, Arc<InMemoryUserDirectory>) {
        let users = Arc::new(InMemoryUserDirectory::new());
        let metrics = Metrics::new();
        let resolver = AddressResolver::new(
            Arc::new(Gazetteer::polish_cities()),
            1,
            Duration::from_secs(1),
            metrics.clone(),
        );
        let service = ShipmentService::new(
            Arc::new(InMemoryShipmentRepository::new()),
            Arc::new(resolver),
            users.clone(),
            Arc::new(BroadcastNotifier::new(16)),
            metrics,
        );
        (service, users)
    }

    #[tokio::test]
    async fn seeding_creates_claimed_demo_shipments() {
        let (service, users) = setup();
        let admin = Actor::new(Uuid::new_v4(), Role::Admin);

        let report = seed_demo_data(&service, users.as_ref(), &admin).await.unwrap();
        assert_eq!(report.shipment_ids.len(), DEMO_ROUTES.len());

        let courier = Actor::new(report.courier_id, Role::Courier);
        let assigned = service.get_all_shipments(&courier).await.unwrap();
        assert_eq!(assigned.len(), DEMO_ROUTES.len());
        assert!(assigned
            .iter()
            .all(|s| s.status == ShipmentStatus::ReadyForPickup && s.sender_id == report.sender_id));
    }

    #[tokio::test]
    async fn reseeding_reuses_demo_users() {
        let (service, users) = setup();
        let admin = Actor::new(Uuid::new_v4(), Role::Admin);

        let first = seed_demo_data(&service, users.as_ref(), &admin).await.unwrap();
        let second = seed_demo_data(&service, users.as_ref(), &admin).await.unwrap();

        assert_eq!(first.sender_id, second.sender_id);
        assert_eq!(first.courier_id, second.courier_id);
        assert_eq!(service.get_all_shipments(&admin).await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn only_admin_may_seed() {
        let (service, users) = setup();
        let manager = Actor::new(Uuid::new_v4(), Role::Manager);

        let err = seed_demo_data(&service, users.as_ref(), &manager)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
