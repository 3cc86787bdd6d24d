//! Platform-specific query construction and response parsing.
//!
//! Everything that knows the remote platform's GraphQL surface lives
//! here: the form-encoded query transport ([`GraphClient`]), the entity
//! lookup, the per-collection [`crate::listing::ListingSource`]
//! implementations, and the secondary media-URL resolver. The rest of the
//! crate sees only the typed seams ([`crate::listing`],
//! [`crate::resolver`]) - no speculative field access escapes this module.

mod client;
mod entity;
mod listing;
mod resolve;

pub use client::{GraphClient, GraphError};
pub use entity::{EntityAbout, EntityKind, entity_about};
pub use listing::GraphListing;
pub use resolve::GraphResolver;

/// Walks `path` into a JSON object tree, taking ownership of the value at
/// the end. `None` when any step is missing or not an object.
pub(crate) fn take_path(value: serde_json::Value, path: &[&str]) -> Option<serde_json::Value> {
    let mut current = value;
    for key in path {
        let serde_json::Value::Object(mut map) = current else {
            return None;
        };
        current = map.remove(*key)?;
        if current.is_null() {
            return None;
        }
    }
    Some(current)
}

/// Default GraphQL endpoint.
pub const DEFAULT_GRAPHQL_ENDPOINT: &str = "https://www.facebook.com/api/graphql/";

/// Default page carrying the session token in a plain form field.
pub const DEFAULT_TOKEN_UPLOAD_PAGE: &str = "https://mbasic.facebook.com/photos/upload/";

/// Default fallback page carrying the session token in embedded script.
pub const DEFAULT_TOKEN_HOME_PAGE: &str = "https://m.facebook.com/home.php";
