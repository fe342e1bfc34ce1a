pub mod error;

pub use error::DriverError;
