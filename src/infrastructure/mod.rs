pub mod audit;
pub mod cipher;
pub mod config;
pub mod db;
pub mod memory_store;
pub mod notifier;
