pub mod log;
pub mod collections;
