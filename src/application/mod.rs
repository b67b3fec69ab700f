pub mod context;
pub mod cycle;
