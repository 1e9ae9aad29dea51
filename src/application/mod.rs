//! Application layer: the services that orchestrate the domain over the ports.
//!
//! `OrderService` owns order creation and the status machine,
//! `PaymentService` owns processor transactions, and both paths that can
//! confirm a payment meet in the `reconcile` reducer.

pub mod delivery;
pub mod identifiers;
pub mod order_service;
pub mod payment_service;
pub mod reconcile;
pub mod side_effects;
pub mod signature;
