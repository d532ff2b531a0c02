//! Domain types and the ports the application layer depends on.

pub mod contract;
pub mod order;
pub mod payer;
pub mod ports;
pub mod pricing;
