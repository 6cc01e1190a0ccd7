pub mod ranking;
pub mod seed;
pub mod service;
pub mod status;
