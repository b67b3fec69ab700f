pub mod indicators;
pub mod portfolio;
pub mod position_sizer;
pub mod price_history;
pub mod strategies;
pub mod swap_details;
pub mod trade_execution_error;
pub mod trade_executor;
pub mod trade_validator;
