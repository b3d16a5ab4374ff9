pub mod audit;
pub mod conflict;
pub mod entry;
pub mod fingerprint;
pub mod ports;
pub mod resolution;
pub mod scan_report;
pub mod value_objects;
