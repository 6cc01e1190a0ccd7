pub mod actor;
pub mod shipment;
