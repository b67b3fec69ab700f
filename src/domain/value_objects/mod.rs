pub mod interval;
pub mod pnl;
pub mod quantity;
