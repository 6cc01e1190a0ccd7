//! Shipment business rules: role checks, the status state machine, courier
//! claims, and distance ranking.
//!
//! Every mutation goes through one conditional repository write. Address
//! resolution always finishes before the write it feeds, and no storage work
//! is held open across a geocoding call.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::directory::UserDirectory;
use crate::engine::ranking::{rank_by_distance, RankedShipment};
use crate::engine::status::can_transition;
use crate::error::AppError;
use crate::geo::resolver::AddressResolver;
use crate::geo::Coordinates;
use crate::models::actor::{is_allowed, Actor, Role};
use crate::models::shipment::{
    normalize_email, Location, NewShipment, ResolvedAddress, Shipment, ShipmentDraft,
    ShipmentId, ShipmentReplacement, ShipmentStatus, ShipmentUpdate,
};
use crate::notify::NotificationPort;
use crate::observability::metrics::Metrics;
use crate::repository::{ShipmentFilter, ShipmentRepository};

const ADMIN_ONLY: &[Role] = &[];
const SHIPPERS: &[Role] = &[Role::Sender, Role::Client];
const COURIERS: &[Role] = &[Role::Courier];
const DISPATCHERS: &[Role] = &[Role::Courier, Role::Manager];

fn require_role(actor: &Actor, required: &[Role]) -> Result<(), AppError> {
    if is_allowed(actor.role, required) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "role '{}' may not perform this action",
            actor.role
        )))
    }
}

/// Listing scope for an actor.
pub fn visibility(actor: &Actor) -> ShipmentFilter {
    if actor.role.sees_all_shipments() {
        ShipmentFilter::All
    } else if actor.role == Role::Courier {
        ShipmentFilter::Courier(actor.id)
    } else {
        ShipmentFilter::Sender(actor.id)
    }
}

pub struct ShipmentService {
    repository: Arc<dyn ShipmentRepository>,
    resolver: Arc<AddressResolver>,
    users: Arc<dyn UserDirectory>,
    notifier: Arc<dyn NotificationPort>,
    metrics: Metrics,
}

impl ShipmentService {
    pub fn new(
        repository: Arc<dyn ShipmentRepository>,
        resolver: Arc<AddressResolver>,
        users: Arc<dyn UserDirectory>,
        notifier: Arc<dyn NotificationPort>,
        metrics: Metrics,
    ) -> Self {
        Self {
            repository,
            resolver,
            users,
            notifier,
            metrics,
        }
    }

    pub fn storage_backend(&self) -> &'static str {
        self.repository.backend()
    }

    pub fn geocoder_kind(&self) -> &'static str {
        self.resolver.geocoder_kind()
    }

    pub async fn add_shipment(&self, actor: &Actor, data: NewShipment) -> Result<Shipment, AppError> {
        require_role(actor, SHIPPERS)?;
        data.package.validate().map_err(AppError::Validation)?;
        let recipient_email = normalize_email(data.recipient_email).map_err(AppError::Validation)?;

        let origin = self.resolve_location("origin", &data.origin).await?;
        let destination = self.resolve_location("destination", &data.destination).await?;

        let shipment = self
            .repository
            .insert(ShipmentDraft {
                sender_id: actor.id,
                recipient_id: data.recipient_id,
                recipient_email,
                origin,
                destination,
                package: data.package,
            })
            .await?;

        self.metrics.shipments_created_total.inc();
        info!(
            shipment_id = shipment.id,
            sender_id = %shipment.sender_id,
            "shipment created"
        );

        self.notify_recipient(&shipment);
        Ok(shipment)
    }

    pub async fn assign_shipment_to_courier(
        &self,
        actor: &Actor,
        shipment_id: ShipmentId,
        courier_id: Uuid,
    ) -> Result<Shipment, AppError> {
        require_role(actor, DISPATCHERS)?;
        if actor.role == Role::Courier && actor.id != courier_id {
            return Err(AppError::Forbidden(
                "couriers may only claim shipments for themselves".to_string(),
            ));
        }

        let courier = self
            .users
            .get_user_by_id(courier_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("courier {courier_id} not found")))?;
        if courier.role != Role::Courier {
            return Err(AppError::Validation(format!(
                "user {courier_id} is not a courier"
            )));
        }

        match self.repository.claim(shipment_id, courier_id).await? {
            Some(shipment) => {
                self.metrics.claims_total.with_label_values(&["won"]).inc();
                info!(shipment_id, courier_id = %courier_id, "shipment claimed");
                Ok(shipment)
            }
            None => {
                self.metrics.claims_total.with_label_values(&["lost"]).inc();
                Err(AppError::NotFound(format!(
                    "shipment {shipment_id} not found or already assigned"
                )))
            }
        }
    }

    pub async fn update_status(
        &self,
        actor: &Actor,
        shipment_id: ShipmentId,
        new_status: ShipmentStatus,
    ) -> Result<Shipment, AppError> {
        require_role(actor, COURIERS)?;

        let current = self
            .repository
            .get(shipment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("shipment {shipment_id} not found")))?;

        if current.courier_id != Some(actor.id) {
            return Err(AppError::NotAssignedToCourier(shipment_id));
        }

        if !can_transition(current.status, new_status) {
            self.record_transition(new_status, "rejected");
            return Err(AppError::InvalidTransition {
                from: current.status,
                to: new_status,
            });
        }

        match self
            .repository
            .transition_status(shipment_id, actor.id, current.status, new_status)
            .await?
        {
            Some(shipment) => {
                self.record_transition(new_status, "applied");
                info!(
                    shipment_id,
                    from = %current.status,
                    to = %new_status,
                    "shipment status changed"
                );
                Ok(shipment)
            }
            None => {
                self.record_transition(new_status, "lost_race");
                Err(AppError::NotFound(format!(
                    "shipment {shipment_id} not found or changed concurrently"
                )))
            }
        }
    }

    /// Unauthenticated tracking lookup. A wrong email is indistinguishable
    /// from a missing shipment.
    pub async fn check_status(
        &self,
        shipment_id: ShipmentId,
        recipient_email: &str,
    ) -> Result<Shipment, AppError> {
        let not_found = || AppError::NotFound(format!("shipment {shipment_id} not found"));

        if recipient_email.is_empty() {
            return Err(not_found());
        }

        self.repository
            .find_for_recipient(shipment_id, recipient_email)
            .await?
            .ok_or_else(not_found)
    }

    pub async fn get_all_shipments(&self, actor: &Actor) -> Result<Vec<Shipment>, AppError> {
        Ok(self.repository.list(visibility(actor)).await?)
    }

    pub async fn get_shipment(
        &self,
        actor: &Actor,
        shipment_id: ShipmentId,
    ) -> Result<Shipment, AppError> {
        self.repository
            .get(shipment_id)
            .await?
            .filter(|shipment| visibility(actor).matches(shipment))
            .ok_or_else(|| AppError::NotFound(format!("shipment {shipment_id} not found")))
    }

    /// Ranks a courier's open shipments by distance from where the courier is
    /// now. The courier position is resolved on every call.
    pub async fn sort_by_distance(
        &self,
        actor: &Actor,
        courier_id: Uuid,
        courier_location: &Location,
    ) -> Result<Vec<RankedShipment>, AppError> {
        require_role(actor, DISPATCHERS)?;
        if actor.role == Role::Courier && actor.id != courier_id {
            return Err(AppError::Forbidden(
                "couriers may only rank their own shipments".to_string(),
            ));
        }

        let position = self
            .resolve_location("courier location", courier_location)
            .await?
            .coordinates;
        let shipments = self
            .repository
            .list(ShipmentFilter::Courier(courier_id))
            .await?;

        Ok(rank_by_distance(&position, shipments))
    }

    pub async fn update_shipment(
        &self,
        actor: &Actor,
        shipment_id: ShipmentId,
        update: ShipmentUpdate,
    ) -> Result<Shipment, AppError> {
        require_role(actor, ADMIN_ONLY)?;
        update.package.validate().map_err(AppError::Validation)?;
        let recipient_email =
            normalize_email(update.recipient_email).map_err(AppError::Validation)?;

        let current = self
            .repository
            .get(shipment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("shipment {shipment_id} not found")))?;

        let origin = match &update.origin {
            Some(location) => self.resolve_location("origin", location).await?,
            None => current.origin,
        };
        let destination = match &update.destination {
            Some(location) => self.resolve_location("destination", location).await?,
            None => current.destination,
        };

        let shipment = self
            .repository
            .replace(
                shipment_id,
                ShipmentReplacement {
                    recipient_id: update.recipient_id,
                    recipient_email,
                    origin,
                    destination,
                    package: update.package,
                },
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("shipment {shipment_id} not found")))?;

        info!(shipment_id, actor_id = %actor.id, "shipment replaced");
        Ok(shipment)
    }

    pub async fn delete_shipment(
        &self,
        actor: &Actor,
        shipment_id: ShipmentId,
    ) -> Result<Shipment, AppError> {
        require_role(actor, ADMIN_ONLY)?;

        let shipment = self
            .repository
            .delete(shipment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("shipment {shipment_id} not found")))?;

        info!(shipment_id, actor_id = %actor.id, "shipment deleted");
        Ok(shipment)
    }

    pub async fn reverse_geocode(&self, actor: &Actor, at: Coordinates) -> Result<String, AppError> {
        require_role(actor, ADMIN_ONLY)?;
        Ok(self.resolver.reverse_resolve(at).await?)
    }

    async fn resolve_location(
        &self,
        field: &str,
        location: &Location,
    ) -> Result<ResolvedAddress, AppError> {
        if location.is_blank() {
            return Err(AppError::Validation(format!("{field} address is empty")));
        }
        Ok(self.resolver.resolve_structured(location).await?)
    }

    fn record_transition(&self, to: ShipmentStatus, outcome: &str) {
        self.metrics
            .status_transitions_total
            .with_label_values(&[to.as_str(), outcome])
            .inc();
    }

    fn notify_recipient(&self, shipment: &Shipment) {
        let Some(email) = shipment.recipient_email.clone() else {
            return;
        };

        let notifier = self.notifier.clone();
        let metrics = self.metrics.clone();
        let shipment_id = shipment.id;
        tokio::spawn(async move {
            match notifier.notify_recipient(shipment_id, &email).await {
                Ok(()) => metrics.notifications_total.with_label_values(&["sent"]).inc(),
                Err(err) => {
                    metrics.notifications_total.with_label_values(&["failed"]).inc();
                    warn!(shipment_id, error = %err, "recipient notification failed");
                }
            }
        });
    }
}
