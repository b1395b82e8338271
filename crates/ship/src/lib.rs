pub mod envelope;
pub mod error;
pub mod shipper;

pub use error::ShipError;
pub use shipper::{ArcShipper, ShipperConfig};
