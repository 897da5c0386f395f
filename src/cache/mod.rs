pub mod device;
pub mod segment;
