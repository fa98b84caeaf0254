//! Macro for implementing Display and FromStr for vocabulary enums
//!
//! Attendance vocabularies are stored as their human-facing labels
//! ("Late In", "Att Adjustment"), so the macro keeps the label's casing on
//! output and matches case-insensitively on input.
//!
//! # Example
//!
//! ```rust
//! use timekeep_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Shade {
//!     Early,
//!     Late,
//! }
//!
//! impl_domain_status_conversions!(Shade {
//!     Early => "Early In",
//!     Late => "Late In",
//! });
//!
//! assert_eq!(Shade::Late.to_string(), "Late In");
//! assert_eq!("late in".parse::<Shade>(), Ok(Shade::Late));
//! ```

/// Implements Display and FromStr traits for label enums
///
/// This macro generates:
/// - Display trait: writes the label exactly as given
/// - FromStr trait: parses labels ignoring ASCII case
/// - `as_str()`: the label as a `&'static str`
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Canonical storage label.
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
                $(
                    if s.trim().eq_ignore_ascii_case($str) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(format!("Invalid {}: {}", stringify!($enum_name), s))
            }
        }
    };
}
