//! Traits for the collaborators the trading cycle talks to.
//!
//! Concrete implementations live in `infrastructure` (HTTP services),
//! `persistence` (SQLite stores) and `secrets`. Tests supply hand-written mocks.

pub mod market_data;
pub mod secret_service;
pub mod swap_client;
pub mod trading_store;
