pub mod investor;
pub mod stock;
pub mod transaction;
