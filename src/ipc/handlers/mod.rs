pub mod backup_exchange;
pub mod core;
pub mod dashboard;
pub mod data;
pub mod reports;
pub mod session;
pub mod sync;
