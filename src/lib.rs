//! Shopcore
//!
//! Inventory-aware cart and order service.
//!
//! ## Features
//! - Per-user shopping cart with live price snapshots
//! - Atomic, all-or-nothing stock reservation at checkout
//! - Order status state machine with cancellation restock
//! - Configurable tax and shipping pricing
//!
//! Catalog CRUD, authentication, and payment-gateway integration live in
//! upstream collaborators; this service consumes an authenticated principal
//! and product records and owns the cart-to-order transaction core.

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod pricing;
pub mod response;
pub mod service;
pub mod store;

pub use error::{Error, Result};
