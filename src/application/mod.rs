pub mod detector;
pub mod monitoring;
pub mod resolver;
pub mod scan;
