//! Domain layer: value objects, entities and the ports the application
//! layer depends on.

pub mod catalog;
pub mod events;
pub mod money;
pub mod order;
pub mod payment;
pub mod ports;
