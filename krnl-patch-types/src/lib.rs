#![forbid(unsafe_code)]

pub mod address;
pub mod image;
pub mod kernel;
pub mod program;
pub mod sampler;

pub mod error {
    #[derive(Debug, thiserror::Error)]
    #[error("unknown {} value {}", .kind, .value)]
    pub struct WireValueError {
        pub kind: &'static str,
        pub value: u32,
    }
}

/// Declares an enum with fixed wire values.
///
/// Generates `as_u32`, `TryFrom<u32>` and a `VARIANTS` table in declaration order.
#[doc(hidden)]
#[macro_export]
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, serde::Serialize, serde::Deserialize, derive_more::Display)]
        #[repr(u32)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value),+
        }

        impl $name {
            pub const VARIANTS: &'static [Self] = &[$(Self::$variant),+];
            pub fn as_u32(self) -> u32 {
                self as u32
            }
        }

        impl TryFrom<u32> for $name {
            type Error = $crate::error::WireValueError;
            fn try_from(value: u32) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(Self::$variant),)+
                    _ => Err($crate::error::WireValueError {
                        kind: stringify!($name),
                        value,
                    }),
                }
            }
        }

        impl From<$name> for u32 {
            fn from(x: $name) -> u32 {
                x.as_u32()
            }
        }
    };
}
