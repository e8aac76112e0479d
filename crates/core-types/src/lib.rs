pub mod enums;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{CooldownKind, Direction, ExitReason, OrderSide, OrderStatus, OrderType};
pub use structs::{
    AccountBalance, Cooldown, OpenOrder, OrderAck, OrderRequest, PositionSnapshot, PriceSample,
    Signal, TrailingStopState,
};
