//! Resource routing
//!
//! Maps `content://<authority>/<resource>[/<id>]` addresses (or bare
//! `<resource>[/<id>]` paths) onto a closed set of resource kinds. The route
//! table is compiled once and never mutated afterwards.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, Result};

/// Scheme of every provider address
pub const SCHEME: &str = "content";

/// Authority used when none is configured
pub const DEFAULT_AUTHORITY: &str = "org.rapidandroid.provider";

/// Addressable resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// `message` and `message/{id}`
    Message,
    /// `monitor` and `monitor/{id}`
    Monitor,
    /// `messagesbymonitor/{id}`: messages filtered by their monitor
    MessagesByMonitor,
    /// `form` and `form/{id}`
    Form,
    /// `field` and `field/{id}`
    Field,
    /// `fieldtype` and `fieldtype/{id}`
    FieldType,
    /// `formdata/{formId}`: a form's dynamic table
    FormData,
}

impl ResourceKind {
    /// Every kind, in route table order
    pub const ALL: [Self; 7] = [
        Self::Message,
        Self::Monitor,
        Self::MessagesByMonitor,
        Self::Form,
        Self::Field,
        Self::FieldType,
        Self::FormData,
    ];

    /// Path segment naming this kind
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Monitor => "monitor",
            Self::MessagesByMonitor => "messagesbymonitor",
            Self::Form => "form",
            Self::Field => "field",
            Self::FieldType => "fieldtype",
            Self::FormData => "formdata",
        }
    }

    /// Whether the bare collection path is routable
    const fn has_collection_route(self) -> bool {
        !matches!(self, Self::MessagesByMonitor | Self::FormData)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// A routed address: resource kind plus optional numeric id
///
/// For [`ResourceKind::MessagesByMonitor`] the id is the monitor id and for
/// [`ResourceKind::FormData`] it is the form id; both always carry one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    /// Resource kind
    pub kind: ResourceKind,
    /// Row id, monitor id or form id depending on the kind
    pub id: Option<i64>,
}

impl Locator {
    /// Collection locator for a kind
    #[must_use]
    pub const fn collection(kind: ResourceKind) -> Self {
        Self { kind, id: None }
    }

    /// Item locator for a kind
    #[must_use]
    pub const fn item(kind: ResourceKind, id: i64) -> Self {
        Self { kind, id: Some(id) }
    }

    /// The collection this locator belongs to
    #[must_use]
    pub const fn parent(&self) -> Self {
        Self::collection(self.kind)
    }

    /// True when `other` is this locator or lies inside this collection
    #[must_use]
    pub fn covers(&self, other: &Self) -> bool {
        self == other || *self == other.parent()
    }

    /// Relative path, e.g. `message/4`
    #[must_use]
    pub fn path(&self) -> String {
        match self.id {
            Some(id) => format!("{}/{id}", self.kind.path()),
            None => self.kind.path().to_string(),
        }
    }

    /// Full address under `authority`
    #[must_use]
    pub fn to_uri(&self, authority: &str) -> String {
        format!("{SCHEME}://{authority}/{}", self.path())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

struct Route {
    pattern: Regex,
    kind: ResourceKind,
}

/// Immutable route table
pub struct Router {
    authority: String,
    routes: Vec<Route>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("authority", &self.authority)
            .field("routes", &self.routes.len())
            .finish()
    }
}

impl Router {
    /// Build the route table for `authority`
    #[must_use]
    pub fn new(authority: &str) -> Self {
        let mut routes = Vec::new();
        for kind in ResourceKind::ALL {
            if kind.has_collection_route() {
                routes.push(Route::new(&format!("^{}$", kind.path()), kind));
            }
            routes.push(Route::new(&format!(r"^{}/(\d+)$", kind.path()), kind));
        }

        Self {
            authority: authority.to_string(),
            routes,
        }
    }

    /// Authority this router accepts
    #[must_use]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Resolve a full address or a bare path
    pub fn resolve(&self, address: &str) -> Result<Locator> {
        let path = match address.split_once("://") {
            Some((scheme, rest)) => {
                let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
                if scheme != SCHEME || authority != self.authority {
                    return Err(ProviderError::UnknownResource(address.to_string()));
                }
                path
            },
            None => address,
        };

        self.resolve_path(path.trim_end_matches('/'))
            .ok_or_else(|| ProviderError::UnknownResource(address.to_string()))
    }

    fn resolve_path(&self, path: &str) -> Option<Locator> {
        self.routes.iter().find_map(|route| {
            let captures = route.pattern.captures(path)?;
            match captures.get(1) {
                Some(id) => id.as_str().parse().ok().map(|id| Locator::item(route.kind, id)),
                None => Some(Locator::collection(route.kind)),
            }
        })
    }

    /// Full address for a locator under this router's authority
    #[must_use]
    pub fn uri_for(&self, locator: &Locator) -> String {
        locator.to_uri(&self.authority)
    }

    /// MIME-like type string for a locator
    ///
    /// `messagesbymonitor/{id}` reports the monitor collection type and
    /// `formdata/{id}` the formdata collection type.
    #[must_use]
    pub fn content_type(&self, locator: &Locator) -> String {
        match (locator.kind, locator.id) {
            (ResourceKind::MessagesByMonitor, _) => collection_type(ResourceKind::Monitor),
            (ResourceKind::FormData, _) | (_, None) => collection_type(locator.kind),
            (kind, Some(_)) => format!("vnd.rapidsms.item/{}", kind.path()),
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(DEFAULT_AUTHORITY)
    }
}

impl Route {
    fn new(pattern: &str, kind: ResourceKind) -> Self {
        // Patterns are built from fixed path segments and always compile.
        #[allow(clippy::expect_used)]
        let pattern = Regex::new(pattern).expect("route pattern must compile");
        Self { pattern, kind }
    }
}

fn collection_type(kind: ResourceKind) -> String {
    format!("vnd.rapidsms.dir/{}", kind.path())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_and_item_routes() {
        let router = Router::default();
        assert_eq!(router.resolve("message").unwrap(), Locator::collection(ResourceKind::Message));
        assert_eq!(router.resolve("fieldtype/12").unwrap(), Locator::item(ResourceKind::FieldType, 12));
        assert_eq!(
            router.resolve("content://org.rapidandroid.provider/messagesbymonitor/3").unwrap(),
            Locator::item(ResourceKind::MessagesByMonitor, 3)
        );
    }

    #[test]
    fn test_filtered_kinds_require_id() {
        let router = Router::default();
        assert!(router.resolve("messagesbymonitor").is_err());
        assert!(router.resolve("formdata").is_err());
    }

    #[test]
    fn test_foreign_authority_rejected() {
        let router = Router::default();
        let err = router.resolve("content://com.example/message").unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[test]
    fn test_content_types() {
        let router = Router::default();
        assert_eq!(
            router.content_type(&Locator::item(ResourceKind::Message, 1)),
            "vnd.rapidsms.item/message"
        );
        assert_eq!(
            router.content_type(&Locator::item(ResourceKind::MessagesByMonitor, 1)),
            "vnd.rapidsms.dir/monitor"
        );
        assert_eq!(
            router.content_type(&Locator::item(ResourceKind::FormData, 2)),
            "vnd.rapidsms.dir/formdata"
        );
    }

    #[test]
    fn test_covers() {
        let messages = Locator::collection(ResourceKind::Message);
        assert!(messages.covers(&Locator::item(ResourceKind::Message, 9)));
        assert!(!Locator::item(ResourceKind::Message, 9).covers(&messages));
        assert!(!messages.covers(&Locator::collection(ResourceKind::Monitor)));
        assert_eq!(Locator::item(ResourceKind::Message, 9).parent(), messages);
    }
}
