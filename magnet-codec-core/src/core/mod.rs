pub mod magnet;
pub mod range;
