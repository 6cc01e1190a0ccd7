//! Shipment storage port.
//!
//! Every state-changing write is a single conditional statement that encodes
//! the expected prior state. A write whose condition no longer holds matches
//! nothing and returns `Ok(None)`; callers must not emulate this with a read
//! followed by an unconditional write.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::shipment::{
    Shipment, ShipmentDraft, ShipmentId, ShipmentReplacement, ShipmentStatus,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("row could not be decoded: {0}")]
    Decode(String),
}

/// Visibility scope for bulk listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShipmentFilter {
    All,
    Courier(Uuid),
    Sender(Uuid),
}

impl ShipmentFilter {
    pub fn matches(&self, shipment: &Shipment) -> bool {
        match self {
            ShipmentFilter::All => true,
            ShipmentFilter::Courier(id) => shipment.courier_id == Some(*id),
            ShipmentFilter::Sender(id) => shipment.sender_id == *id,
        }
    }
}

#[async_trait]
pub trait ShipmentRepository: Send + Sync {
    fn backend(&self) -> &'static str;

    /// Persists a new shipment in `ready_for_pickup` with no courier.
    async fn insert(&self, draft: ShipmentDraft) -> Result<Shipment, RepositoryError>;

    async fn get(&self, id: ShipmentId) -> Result<Option<Shipment>, RepositoryError>;

    /// Looks up a shipment by id and exact recipient email.
    async fn find_for_recipient(
        &self,
        id: ShipmentId,
        recipient_email: &str,
    ) -> Result<Option<Shipment>, RepositoryError>;

    /// Lists shipments matching `filter`, ordered by id.
    async fn list(&self, filter: ShipmentFilter) -> Result<Vec<Shipment>, RepositoryError>;

    /// Sets the courier only while no courier is assigned.
    async fn claim(
        &self,
        id: ShipmentId,
        courier_id: Uuid,
    ) -> Result<Option<Shipment>, RepositoryError>;

    /// Moves `from -> to` only while the shipment is still held by `courier_id`
    /// and still in `from`.
    async fn transition_status(
        &self,
        id: ShipmentId,
        courier_id: Uuid,
        from: ShipmentStatus,
        to: ShipmentStatus,
    ) -> Result<Option<Shipment>, RepositoryError>;

    async fn replace(
        &self,
        id: ShipmentId,
        replacement: ShipmentReplacement,
    ) -> Result<Option<Shipment>, RepositoryError>;

    async fn delete(&self, id: ShipmentId) -> Result<Option<Shipment>, RepositoryError>;
}
