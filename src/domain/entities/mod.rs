pub mod decision;
pub mod portfolio;
pub mod position;
pub mod price_history;
pub mod strategy;
pub mod token;
pub mod transaction;
