//! Supported eLabFTW v2 endpoints and their sub-endpoints.

use crate::api::ApiError;

/// A top-level endpoint and the sub-endpoints it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub name: &'static str,
    pub sub_endpoints: &'static [&'static str],
}

const ENTITY_SUBS: &[&str] = &[
    "comments",
    "experiments_links",
    "items_links",
    "revisions",
    "steps",
    "tags",
    "uploads",
    "request_actions",
    "containers",
];

const TEMPLATE_SUBS: &[&str] = &[
    "comments",
    "experiments_links",
    "items_links",
    "revisions",
    "steps",
    "tags",
    "uploads",
];

const ITEMS_TYPES_SUBS: &[&str] = &["experiments_links", "items_links", "steps", "tags"];

const TEAMS_SUBS: &[&str] = &[
    "experiments_categories",
    "experiments_status",
    "items_status",
    "items_categories",
    "procurement_requests",
    "tags",
    "teamgroups",
];

const USERS_SUBS: &[&str] = &["notifications", "request_actions", "uploads"];

const fn endpoint(name: &'static str, sub_endpoints: &'static [&'static str]) -> Endpoint {
    Endpoint {
        name,
        sub_endpoints,
    }
}

/// Every endpoint the client will talk to.
pub const ENDPOINTS: &[Endpoint] = &[
    endpoint("apikeys", &[]),
    endpoint("config", &[]),
    endpoint("event", &[]),
    endpoint("events", &[]),
    endpoint("experiments", ENTITY_SUBS),
    endpoint("experiments_templates", TEMPLATE_SUBS),
    endpoint("exports", &[]),
    endpoint("extra_fields_keys", &[]),
    endpoint("favtags", &[]),
    endpoint("idps", &[]),
    endpoint("idps_sources", &[]),
    endpoint("import", &[]),
    endpoint("info", &[]),
    endpoint("items", ENTITY_SUBS),
    endpoint("items_types", ITEMS_TYPES_SUBS),
    endpoint("reports", &[]),
    endpoint("teams", TEAMS_SUBS),
    endpoint("todolist", &[]),
    endpoint("unfinished_steps", &[]),
    endpoint("users", USERS_SUBS),
];

impl Endpoint {
    /// Look up an endpoint by name (case-sensitive, as the server is).
    pub fn parse(name: &str) -> Result<&'static Endpoint, ApiError> {
        ENDPOINTS
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| ApiError::UnsupportedEndpoint {
                name: name.to_string(),
                supported: ENDPOINTS.iter().map(|e| e.name).collect::<Vec<_>>().join(", "),
            })
    }

    pub fn validate_sub(&self, name: &str) -> Result<&'static str, ApiError> {
        self.sub_endpoints
            .iter()
            .copied()
            .find(|s| *s == name)
            .ok_or_else(|| ApiError::UnsupportedSubEndpoint {
                endpoint: self.name.to_string(),
                name: name.to_string(),
                supported: if self.sub_endpoints.is_empty() {
                    "none".to_string()
                } else {
                    self.sub_endpoints.join(", ")
                },
            })
    }
}
