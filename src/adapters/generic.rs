//! Catch-all adapter for payloads without a recognized provider.
//!
//! The body says nothing reliable about the event, so the kind comes from
//! the delivery's event header when there is one.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::{branch_from_ref, lookup, lookup_str, Branches, ClassifyError, ProviderPayload};
use crate::domain::{EventKind, Provider, RepoRef};

/// Kind used when no event header was supplied
pub const DEFAULT_KIND: &str = "webhook";

/// A delivery from an unknown sender
pub struct GenericPayload<'a> {
    payload: &'a Map<String, Value>,
    event_hint: Option<&'a str>,
}

impl<'a> GenericPayload<'a> {
    pub fn new(payload: &'a Map<String, Value>, event_hint: Option<&'a str>) -> Self {
        Self {
            payload,
            event_hint,
        }
    }
}

impl ProviderPayload for GenericPayload<'_> {
    fn provider(&self) -> Provider {
        Provider::Generic
    }

    fn kind(&self) -> Result<EventKind, ClassifyError> {
        let hint = self
            .event_hint
            .map(str::trim)
            .filter(|hint| !hint.is_empty())
            .unwrap_or(DEFAULT_KIND);
        Ok(EventKind::from(hint))
    }

    fn repository(&self) -> Result<Option<RepoRef>, ClassifyError> {
        Ok(lookup_str(self.payload, "repository/name").map(|name| RepoRef {
            name,
            full_name: lookup_str(self.payload, "repository/full_name"),
            clone_url_ssh: lookup_str(self.payload, "repository/ssh_url"),
            clone_url_http: lookup_str(self.payload, "repository/clone_url"),
            id: lookup(self.payload, "repository/id").and_then(Value::as_u64),
        }))
    }

    fn branches(&self, _kind: &EventKind) -> Branches {
        Branches::single(
            lookup_str(self.payload, "ref").and_then(|full_ref| branch_from_ref(&full_ref)),
        )
    }

    fn metadata(&self, _kind: &EventKind) -> BTreeMap<String, Value> {
        lookup(self.payload, "hook/id")
            .or_else(|| self.payload.get("hook_id"))
            .filter(|id| !id.is_null())
            .map(|id| BTreeMap::from([("hook_id".to_string(), id.clone())]))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_from_hint() {
        let payload = json!({"hook": {"id": 1}}).as_object().cloned().unwrap();
        assert_eq!(
            GenericPayload::new(&payload, Some("ping")).kind().unwrap(),
            EventKind::Other("ping".to_string())
        );
        assert_eq!(
            GenericPayload::new(&payload, Some("push")).kind().unwrap(),
            EventKind::Push
        );
        assert_eq!(
            GenericPayload::new(&payload, None).kind().unwrap(),
            EventKind::Other(DEFAULT_KIND.to_string())
        );
    }

    #[test]
    fn test_minimal_metadata() {
        let payload = json!({"hook": {"id": 42}}).as_object().cloned().unwrap();
        let generic = GenericPayload::new(&payload, None);
        assert_eq!(generic.repository().unwrap(), None);
        assert_eq!(
            generic.metadata(&EventKind::Other(DEFAULT_KIND.to_string())),
            BTreeMap::from([("hook_id".to_string(), json!(42))])
        );
    }
}
