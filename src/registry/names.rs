//! Validated string keys for variables, operators and coupling terms.
//!
//! Names are checked once, when they are constructed, so that a typo in a
//! variable or operator key surfaces as a [`ConfigurationError`] at
//! registration time instead of as a silently empty block later on.

use crate::assembly_error::ConfigurationError;

/// Check that `value` is a non-empty `[A-Za-z0-9_]` identifier.
pub(crate) fn validate_identifier(kind: &'static str, value: &str) -> Result<(), ConfigurationError> {
    let ok = !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_');
    if ok {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidName {
            kind,
            value: value.to_string(),
        })
    }
}

macro_rules! validated_name {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap a name.
            pub fn new(value: impl Into<String>) -> Result<Self, $crate::assembly_error::ConfigurationError> {
                let value = value.into();
                $crate::registry::names::validate_identifier($kind, &value)?;
                Ok(Self(value))
            }

            /// Borrow the underlying string.
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::assembly_error::ConfigurationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = $crate::assembly_error::ConfigurationError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(name: $name) -> String {
                name.0
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

pub(crate) use validated_name;

validated_name!(
    /// Name of a primary variable, unique within its owning entity.
    VariableName,
    "variable name"
);

validated_name!(
    /// Name of a discretization operator bound to a variable.
    OperatorName,
    "operator name"
);

validated_name!(
    /// Name of a coupling term, unique within its interface.
    CouplingName,
    "coupling name"
);
