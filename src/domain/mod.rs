//! Domain model: products with their stock ledger, the per-user cart
//! aggregate, and the order snapshot with its status state machine.

pub mod cart;
pub mod order;
pub mod product;

pub use cart::{Cart, CartItem, CartStatus};
pub use order::{Order, OrderItem, OrderStatus, PaymentStatus, ShippingAddress};
pub use product::{Product, SizeStock};
