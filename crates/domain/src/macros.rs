//! Display/FromStr conversions for string-backed domain enums
//!
//! Resource types, resource states and event statuses are persisted and
//! received as lowercase strings. This macro keeps the enum and its string
//! form in one mapping.
//!
//! # Example
//!
//! ```rust
//! use calsync_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum ChannelState {
//!     Active,
//!     Expired,
//! }
//!
//! impl_domain_status_conversions!(ChannelState {
//!     Active => "active",
//!     Expired => "expired",
//! });
//!
//! assert_eq!("ACTIVE".parse::<ChannelState>(), Ok(ChannelState::Active));
//! ```

/// Implements `Display` and case-insensitive `FromStr` for an enum.
///
/// Parsing failures are reported as `Invalid <EnumName>: <input>`.
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
