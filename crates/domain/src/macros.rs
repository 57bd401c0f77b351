//! Macro for the string form of persisted status enums
//!
//! Status enums are stored as lowercase text columns and appear in JSON
//! bodies, so each needs a stable `as_str`, `Display` and a case-insensitive
//! `FromStr`. The macro keeps the three in a single mapping table.
//!
//! # Example
//!
//! ```rust
//! use meetsync_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum DeliveryState {
//!     Queued,
//!     Delivered,
//! }
//!
//! impl_domain_status_conversions!(DeliveryState {
//!     Queued => "queued",
//!     Delivered => "delivered",
//! });
//!
//! assert_eq!(DeliveryState::Queued.as_str(), "queued");
//! assert_eq!("DELIVERED".parse::<DeliveryState>(), Ok(DeliveryState::Delivered));
//! ```

/// Implements `as_str`, `Display` and `FromStr` for a status enum.
///
/// Parsing is case-insensitive; output is always the mapped string. The
/// error type of `FromStr` is a `String` naming the enum and the rejected
/// input.
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Stable string form used for storage and wire formats.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
