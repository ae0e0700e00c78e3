//! Newtype identifiers for type-safe entity references.
//!
//! The backend hands out opaque identifiers (document ids, sometimes plain
//! numbers). By the time they reach these types they have been normalized to
//! a single string form, so comparisons never depend on which wire field
//! carried them.

/// Macro to define a type-safe string identifier.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - `new()`, `as_str()`, `into_inner()`
/// - `Display`, `From<String>`, `From<&str>`, `AsRef<str>`
///
/// # Example
///
/// ```rust
/// # use cartwheel_core::define_id;
/// define_id!(ReviewId);
/// define_id!(OrderId);
///
/// let review = ReviewId::new("r-1");
/// let order = OrderId::new("r-1");
///
/// // Same text, different types, so this won't compile:
/// // let _: ReviewId = order;
/// assert_eq!(review.as_str(), order.as_str());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier text.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the identifier and return its text.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(ProductId);
define_id!(UserId);
