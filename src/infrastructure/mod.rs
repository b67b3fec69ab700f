//! HTTP clients for market data and swap execution.

pub mod birdeye_client;
pub mod swap_gateway;
