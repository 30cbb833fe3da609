//! Per-community configuration record.

use std::collections::{BTreeMap, BTreeSet};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use guildkit_core::{GuildId, UserId};

/// Configuration for one community.
///
/// Feature-owned sub-records (starboard settings, archive settings, …) live
/// in [`features`](Self::features) as named JSON sections.  Each section is
/// logically owned by one feature but is stored here and protected by the
/// same record lock as everything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildRecord {
    pub id: GuildId,

    /// Active command prefix.  Never empty once the record is in a store.
    #[serde(default)]
    pub prefix: String,

    /// Capability name → members granted that capability.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub permission_groups: BTreeMap<String, BTreeSet<UserId>>,

    /// Feature name → feature-owned settings.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub features: BTreeMap<String, serde_json::Value>,
}

impl GuildRecord {
    /// Creates a record with default field values.
    pub fn new(id: GuildId, prefix: impl Into<String>) -> Self {
        Self {
            id,
            prefix: prefix.into(),
            permission_groups: BTreeMap::new(),
            features: BTreeMap::new(),
        }
    }

    // ─── Permission groups ───────────────────────────────────────────────────

    /// Adds `user` to `group`.  Returns `false` if already a member.
    pub fn grant(&mut self, group: &str, user: UserId) -> bool {
        self.permission_groups
            .entry(group.to_string())
            .or_default()
            .insert(user)
    }

    /// Removes `user` from `group`, dropping the group when it empties.
    /// Returns `false` if the user was not a member.
    pub fn revoke(&mut self, group: &str, user: UserId) -> bool {
        let Some(members) = self.permission_groups.get_mut(group) else {
            return false;
        };
        let removed = members.remove(&user);
        if members.is_empty() {
            self.permission_groups.remove(group);
        }
        removed
    }

    /// Members of `group`, if it has any.
    pub fn members(&self, group: &str) -> Option<&BTreeSet<UserId>> {
        self.permission_groups.get(group)
    }

    /// Returns `true` if `user` belongs to `group`.
    pub fn has_permission(&self, group: &str, user: UserId) -> bool {
        self.permission_groups
            .get(group)
            .is_some_and(|members| members.contains(&user))
    }

    /// Returns `true` when nobody has been granted `group`, meaning the
    /// capability is not restricted in this community.
    pub fn group_is_open(&self, group: &str) -> bool {
        self.permission_groups
            .get(group)
            .is_none_or(BTreeSet::is_empty)
    }

    // ─── Feature sections ────────────────────────────────────────────────────

    /// Decodes the section stored under `key`.
    pub fn feature<T: DeserializeOwned>(&self, key: &str) -> serde_json::Result<Option<T>> {
        self.features
            .get(key)
            .map(|value| T::deserialize(value))
            .transpose()
    }

    /// Encodes `value` into the section stored under `key`.
    pub fn set_feature<T: Serialize>(&mut self, key: &str, value: &T) -> serde_json::Result<()> {
        let encoded = serde_json::to_value(value)?;
        self.features.insert(key.to_string(), encoded);
        Ok(())
    }

    /// Removes the section stored under `key`.
    pub fn clear_feature(&mut self, key: &str) -> bool {
        self.features.remove(key).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Starboard {
        threshold: u32,
        channel: Option<u64>,
    }

    #[test]
    fn test_grant_and_revoke() {
        let mut record = GuildRecord::new(GuildId(1), ".");
        assert!(record.group_is_open("manage-prefix"));

        assert!(record.grant("manage-prefix", UserId(5)));
        assert!(!record.grant("manage-prefix", UserId(5)));
        assert!(record.has_permission("manage-prefix", UserId(5)));
        assert!(!record.has_permission("manage-prefix", UserId(6)));
        assert!(!record.group_is_open("manage-prefix"));

        assert!(record.revoke("manage-prefix", UserId(5)));
        assert!(!record.revoke("manage-prefix", UserId(5)));
        assert!(record.members("manage-prefix").is_none());
        assert!(record.group_is_open("manage-prefix"));
    }

    #[test]
    fn test_feature_sections() {
        let mut record = GuildRecord::new(GuildId(1), ".");
        assert_eq!(record.feature::<Starboard>("starboard").unwrap(), None);

        let settings = Starboard {
            threshold: 3,
            channel: Some(9),
        };
        record.set_feature("starboard", &settings).unwrap();
        assert_eq!(
            record.feature::<Starboard>("starboard").unwrap(),
            Some(settings)
        );

        // Wrong shape is reported, not defaulted.
        assert!(record.feature::<Vec<String>>("starboard").is_err());
        assert!(record.clear_feature("starboard"));
    }

    #[test]
    fn test_missing_prefix_deserializes_empty() {
        let record: GuildRecord = serde_json::from_str(r#"{"id": 7}"#).unwrap();
        assert_eq!(record.id, GuildId(7));
        assert!(record.prefix.is_empty());
        assert!(record.permission_groups.is_empty());
    }
}
