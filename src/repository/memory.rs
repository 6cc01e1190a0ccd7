use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::engine::status::INITIAL;
use crate::models::shipment::{
    Shipment, ShipmentDraft, ShipmentId, ShipmentReplacement, ShipmentStatus,
};
use crate::repository::{RepositoryError, ShipmentFilter, ShipmentRepository};

/// Process-local storage. A conditional write checks and mutates under the
/// entry's shard write lock, which gives it the same all-or-nothing outcome
/// as a guarded `UPDATE`.
pub struct InMemoryShipmentRepository {
    shipments: DashMap<ShipmentId, Shipment>,
    next_id: AtomicI64,
}

impl InMemoryShipmentRepository {
    pub fn new() -> Self {
        Self {
            shipments: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.shipments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shipments.is_empty()
    }

    fn update_where<P, F>(&self, id: ShipmentId, condition: P, apply: F) -> Option<Shipment>
    where
        P: FnOnce(&Shipment) -> bool,
        F: FnOnce(&mut Shipment),
    {
        let mut entry = self.shipments.get_mut(&id)?;
        if !condition(entry.value()) {
            return None;
        }

        apply(entry.value_mut());
        entry.last_updated = Utc::now();
        Some(entry.value().clone())
    }
}

impl Default for InMemoryShipmentRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShipmentRepository for InMemoryShipmentRepository {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, draft: ShipmentDraft) -> Result<Shipment, RepositoryError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let shipment = Shipment {
            id,
            sender_id: draft.sender_id,
            recipient_id: draft.recipient_id,
            recipient_email: draft.recipient_email,
            courier_id: None,
            status: INITIAL,
            origin: draft.origin,
            destination: draft.destination,
            package: draft.package,
            created_at: now,
            last_updated: now,
        };

        self.shipments.insert(id, shipment.clone());
        Ok(shipment)
    }

    async fn get(&self, id: ShipmentId) -> Result<Option<Shipment>, RepositoryError> {
        Ok(self.shipments.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_for_recipient(
        &self,
        id: ShipmentId,
        recipient_email: &str,
    ) -> Result<Option<Shipment>, RepositoryError> {
        Ok(self
            .shipments
            .get(&id)
            .filter(|entry| entry.recipient_email.as_deref() == Some(recipient_email))
            .map(|entry| entry.value().clone()))
    }

    async fn list(&self, filter: ShipmentFilter) -> Result<Vec<Shipment>, RepositoryError> {
        let mut shipments: Vec<Shipment> = self
            .shipments
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        shipments.sort_by_key(|shipment| shipment.id);
        Ok(shipments)
    }

    async fn claim(
        &self,
        id: ShipmentId,
        courier_id: Uuid,
    ) -> Result<Option<Shipment>, RepositoryError> {
        Ok(self.update_where(
            id,
            |shipment| shipment.courier_id.is_none(),
            |shipment| shipment.courier_id = Some(courier_id),
        ))
    }

    async fn transition_status(
        &self,
        id: ShipmentId,
        courier_id: Uuid,
        from: ShipmentStatus,
        to: ShipmentStatus,
    ) -> Result<Option<Shipment>, RepositoryError> {
        Ok(self.update_where(
            id,
            |shipment| shipment.courier_id == Some(courier_id) && shipment.status == from,
            |shipment| shipment.status = to,
        ))
    }

    async fn replace(
        &self,
        id: ShipmentId,
        replacement: ShipmentReplacement,
    ) -> Result<Option<Shipment>, RepositoryError> {
        Ok(self.update_where(
            id,
            |_| true,
            |shipment| {
                shipment.recipient_id = replacement.recipient_id;
                shipment.recipient_email = replacement.recipient_email;
                shipment.origin = replacement.origin;
                shipment.destination = replacement.destination;
                shipment.package = replacement.package;
            },
        ))
    }

    async fn delete(&self, id: ShipmentId) -> Result<Option<Shipment>, RepositoryError> {
        Ok(self.shipments.remove(&id).map(|(_, shipment)| shipment))
    }
}
