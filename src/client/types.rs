use serde::{Deserialize, Deserializer, Serialize};

/// Declares a closed enum that travels as a SCREAMING_SNAKE_CASE string.
///
/// Generates serde derives, `as_str`, `Display` and a `FromStr` that rejects
/// unknown values with [`BuildkiteError::Invalid`](crate::error::BuildkiteError::Invalid).
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $value)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $value,)+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::error::BuildkiteError;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s {
                    $($value => Ok(Self::$variant),)+
                    other => Err($crate::error::BuildkiteError::Invalid(format!(
                        "unknown {} {other:?}",
                        stringify!($name)
                    ))),
                }
            }
        }
    };
}

pub(crate) use string_enum;

/// Identity-only reference to another Buildkite entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// GraphQL global ID
    #[serde(default)]
    pub id: String,
    /// Slug, when the query asked for it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

impl Node {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            slug: None,
        }
    }

    pub fn with_slug(slug: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            slug: Some(slug.into()),
        }
    }

    pub fn slug(&self) -> &str {
        self.slug.as_deref().unwrap_or_default()
    }
}

/// Variables of a mutation taking a single `$input` argument.
#[derive(Debug, Serialize)]
pub(crate) struct MutationInput<T> {
    pub(crate) input: T,
}

impl<T> MutationInput<T> {
    pub(crate) fn new(input: T) -> Self {
        Self { input }
    }
}

/// A bare node ID, used by node lookups and delete mutations.
#[derive(Debug, Serialize)]
pub(crate) struct IdInput {
    pub(crate) id: String,
}

impl IdInput {
    pub(crate) fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

/// Reads an explicit JSON `null` as the type's default value.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
