//! Business operations over the storage traits. Handlers stay thin; every
//! rule about stock, pricing, and status lives here.

pub mod cart;
pub mod inventory;
pub mod order;

pub use cart::CartService;
pub use inventory::InventoryReservation;
pub use order::OrderService;

use uuid::Uuid;

/// Authenticated principal attached to each request by the upstream auth
/// layer. The core only ever compares the role gate.
#[derive(Debug, Clone, Copy)]
pub struct Principal {
    pub id: Uuid,
    pub is_admin: bool,
}
