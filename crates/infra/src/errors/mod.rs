//! Infrastructure error handling

mod conversions;

pub(crate) use conversions::transport_error;
pub use conversions::InfraError;
