pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{OrderSide, OrderStatus, OrderType, TimeInForce};
pub use error::CoreError;
pub use structs::{Balance, Order, OrderRequest, Position, PriceQuote};
