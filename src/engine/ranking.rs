use serde::{Deserialize, Serialize};

use crate::geo::{distance_km, Coordinates};
use crate::models::shipment::{Shipment, ShipmentStatus};

/// The part of a journey a courier still has to travel to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Leg {
    Origin,
    Destination,
}

/// Pending leg for a status; `None` when there is nothing left to travel to.
pub fn pending_leg(status: ShipmentStatus) -> Option<Leg> {
    match status {
        ShipmentStatus::ReadyForPickup | ShipmentStatus::ReturnedToSender => Some(Leg::Origin),
        ShipmentStatus::OutForDelivery | ShipmentStatus::FailedAttempt => Some(Leg::Destination),
        ShipmentStatus::Delivered | ShipmentStatus::Lost | ShipmentStatus::Damaged => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedShipment {
    #[serde(flatten)]
    pub shipment: Shipment,
    pub leg: Leg,
    pub origin_distance: Option<f64>,
    pub destination_distance: Option<f64>,
}

impl RankedShipment {
    pub fn distance(&self) -> f64 {
        match self.leg {
            Leg::Origin => self.origin_distance,
            Leg::Destination => self.destination_distance,
        }
        .unwrap_or(f64::INFINITY)
    }
}

/// Orders shipments by distance from `from` to each shipment's pending leg,
/// nearest first, ties broken by id. Shipments without a pending leg are
/// dropped.
pub fn rank_by_distance(from: &Coordinates, shipments: Vec<Shipment>) -> Vec<RankedShipment> {
    let mut ranked: Vec<RankedShipment> = shipments
        .into_iter()
        .filter_map(|shipment| {
            let leg = pending_leg(shipment.status)?;
            let (origin_distance, destination_distance) = match leg {
                Leg::Origin => (Some(distance_km(from, &shipment.origin.coordinates)), None),
                Leg::Destination => (
                    None,
                    Some(distance_km(from, &shipment.destination.coordinates)),
                ),
            };

            Some(RankedShipment {
                shipment,
                leg,
                origin_distance,
                destination_distance,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        a.distance()
            .total_cmp(&b.distance())
            .then_with(|| a.shipment.id.cmp(&b.shipment.id))
    });
    ranked
}
