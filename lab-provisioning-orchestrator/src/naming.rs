use std::collections::HashMap;

use lab_provisioning_config::{AttendeeRecord, Config};
use lab_provisioning_provider::ResourceKind;

/// Character and length constraints a provider puts on a resource name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamingRule {
    pub max_len: usize,
    pub allow_hyphen: bool,
    pub lowercase: bool,
}

impl NamingRule {
    pub const EVENT_HUBS_NAMESPACE: Self = Self {
        max_len: 50,
        allow_hyphen: true,
        lowercase: false,
    };
    pub const SQL_SERVER: Self = Self {
        max_len: 63,
        allow_hyphen: true,
        lowercase: true,
    };
    pub const STORAGE_ACCOUNT: Self = Self {
        max_len: 24,
        allow_hyphen: false,
        lowercase: true,
    };

    fn filter_chars(&self, raw: &str) -> String {
        raw.chars()
            .filter(|c| c.is_ascii_alphanumeric() || (self.allow_hyphen && *c == '-'))
            .map(|c| if self.lowercase { c.to_ascii_lowercase() } else { c })
            .take(self.max_len)
            .collect()
    }

    #[must_use]
    pub fn sanitize(&self, raw: &str) -> String {
        let mut name = self.filter_chars(raw);
        // names may not end in a hyphen
        while name.ends_with('-') {
            name.pop();
        }
        name
    }
}

#[must_use]
pub fn derive_name(base: &str, attendee: &str, rule: NamingRule) -> String {
    rule.sanitize(&format!("{base}{attendee}"))
}

/// Maps attendee names to the names of their top level resources.
#[derive(Debug, Clone)]
pub struct NamingScheme {
    sql_server_base: String,
    event_hubs_namespace_base: String,
    storage_account_base: String,
}

impl NamingScheme {
    pub fn new(
        sql_server_base: impl Into<String>,
        event_hubs_namespace_base: impl Into<String>,
        storage_account_base: impl Into<String>,
    ) -> Self {
        Self {
            sql_server_base: sql_server_base.into(),
            event_hubs_namespace_base: event_hubs_namespace_base.into(),
            storage_account_base: storage_account_base.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.sql.server_base_name,
            &config.event_hubs.namespace_base_name,
            &config.storage.account_base_name,
        )
    }

    fn base_and_rule(&self, kind: ResourceKind) -> Option<(&str, NamingRule)> {
        match kind {
            ResourceKind::SqlServer => Some((self.sql_server_base.as_str(), NamingRule::SQL_SERVER)),
            ResourceKind::EventHubNamespace => Some((
                self.event_hubs_namespace_base.as_str(),
                NamingRule::EVENT_HUBS_NAMESPACE,
            )),
            ResourceKind::StorageAccount => Some((
                self.storage_account_base.as_str(),
                NamingRule::STORAGE_ACCOUNT,
            )),
            _ => None,
        }
    }

    /// `None` for sub-resources, their names come from the settings.
    #[must_use]
    pub fn derive(&self, kind: ResourceKind, attendee: &str) -> Option<String> {
        self.base_and_rule(kind)
            .map(|(base, rule)| derive_name(base, attendee, rule))
    }

    #[must_use]
    pub fn sql_server(&self, attendee: &str) -> String {
        derive_name(&self.sql_server_base, attendee, NamingRule::SQL_SERVER)
    }

    #[must_use]
    pub fn event_hubs_namespace(&self, attendee: &str) -> String {
        derive_name(
            &self.event_hubs_namespace_base,
            attendee,
            NamingRule::EVENT_HUBS_NAMESPACE,
        )
    }

    #[must_use]
    pub fn storage_account(&self, attendee: &str) -> String {
        derive_name(
            &self.storage_account_base,
            attendee,
            NamingRule::STORAGE_ACCOUNT,
        )
    }

    /// Whether an existing resource was created by this scheme.
    #[must_use]
    pub fn belongs(&self, kind: ResourceKind, name: &str) -> bool {
        self.base_and_rule(kind).is_some_and(|(base, rule)| {
            let prefix = rule.filter_chars(base);
            name.len() > prefix.len() && name.starts_with(&prefix)
        })
    }

    /// Best effort reverse of [`Self::derive`], truncation cannot be undone.
    #[must_use]
    pub fn attendee_of<'a>(&self, kind: ResourceKind, name: &'a str) -> Option<&'a str> {
        let (base, rule) = self.base_and_rule(kind)?;
        name.strip_prefix(rule.filter_chars(base).as_str())
            .filter(|rest| !rest.is_empty())
    }

    /// Attendees whose derived names clash with an attendee earlier in the
    /// roster, mapped to that earlier attendee.
    #[must_use]
    pub fn collisions(&self, roster: &[AttendeeRecord]) -> HashMap<String, String> {
        let mut owners: HashMap<(ResourceKind, String), &str> = HashMap::new();
        let mut collisions = HashMap::new();
        for attendee in roster {
            for kind in ResourceKind::TOP_LEVEL {
                let Some(name) = self.derive(kind, &attendee.name) else {
                    continue;
                };
                let owner = *owners
                    .entry((kind, name))
                    .or_insert(attendee.name.as_str());
                if owner != attendee.name {
                    collisions
                        .entry(attendee.name.clone())
                        .or_insert_with(|| owner.to_owned());
                }
            }
        }
        collisions
    }

    /// The attendee ahead of `attendee` on `roster` that derives the same
    /// `kind` name, and so owns it. Attendees missing from `roster` come last.
    #[must_use]
    pub fn prior_owner<'a>(
        &self,
        kind: ResourceKind,
        attendee: &str,
        roster: &'a [AttendeeRecord],
    ) -> Option<&'a str> {
        let name = self.derive(kind, attendee)?;
        roster
            .iter()
            .take_while(|other| other.name != attendee)
            .find(|other| self.derive(kind, &other.name).as_ref() == Some(&name))
            .map(|other| other.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheme() -> NamingScheme {
        NamingScheme::new("sqlws-", "ehws-", "stws")
    }

    #[test]
    fn derivation_is_deterministic() {
        for attendee in ["alice", "Bob.Smith", "x_y z", "ünïcode", ""] {
            for kind in ResourceKind::TOP_LEVEL {
                assert_eq!(
                    scheme().derive(kind, attendee),
                    scheme().derive(kind, attendee)
                );
            }
        }
    }

    #[test]
    fn storage_names_are_lowercase_alphanumeric_and_truncated() {
        for attendee in [
            "Bob.Smith",
            "a-very-long-attendee-name-that-exceeds-limits",
            "Zoë_O'Brien",
        ] {
            let name = scheme().storage_account(attendee);
            assert!(name.len() <= 24, "{name}");
            assert!(
                name.chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()),
                "{name}"
            );
        }
        assert_eq!(scheme().storage_account("Bob.Smith"), "stwsbobsmith");
        assert_eq!(
            scheme().storage_account("a-very-long-attendee-name-that-exceeds-limits"),
            "stwsaverylongattendeenam"
        );
    }

    #[test]
    fn hyphenated_kinds_keep_hyphens_but_not_trailing_ones() {
        assert_eq!(scheme().sql_server("Alice"), "sqlws-alice");
        assert_eq!(scheme().event_hubs_namespace("Alice"), "ehws-Alice");
        assert_eq!(NamingRule::SQL_SERVER.sanitize("lab-"), "lab");
    }

    #[test]
    fn recognizes_own_resources() {
        assert!(scheme().belongs(ResourceKind::StorageAccount, "stwsalice"));
        assert!(!scheme().belongs(ResourceKind::StorageAccount, "prodaccount"));
        assert!(!scheme().belongs(ResourceKind::StorageAccount, "stws"));
        assert!(!scheme().belongs(ResourceKind::EventHub, "ehws-alice"));
        assert_eq!(
            scheme().attendee_of(ResourceKind::SqlServer, "sqlws-alice"),
            Some("alice")
        );
    }

    #[test]
    fn detects_collisions_after_sanitizing() {
        let roster = vec![
            AttendeeRecord::new("bob.smith"),
            AttendeeRecord::new("alice"),
            AttendeeRecord::new("bobsmith"),
        ];
        let collisions = scheme().collisions(&roster);
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions["bobsmith"], "bob.smith");
    }

    #[test]
    fn earlier_attendee_owns_a_clashing_name() {
        let roster = vec![AttendeeRecord::new("ann-marie"), AttendeeRecord::new("ann.marie")];
        let storage = ResourceKind::StorageAccount;
        assert_eq!(scheme().prior_owner(storage, "ann-marie", &roster), None);
        assert_eq!(
            scheme().prior_owner(storage, "ann.marie", &roster),
            Some("ann-marie")
        );
        assert_eq!(
            scheme().prior_owner(storage, "annmarie", &roster),
            Some("ann-marie")
        );
        // hyphens survive in sql server names
        assert_eq!(
            scheme().prior_owner(ResourceKind::SqlServer, "ann.marie", &roster),
            None
        );
    }
}
