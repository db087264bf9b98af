//! Loaded baselines for one machine type, keyed by profile

use super::BaselineRecord;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Order profile keys numerically when both parse as numbers ("50" < "100"),
/// numeric keys before named ones, names alphabetically.
pub fn compare_profile_keys(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Profile key with numeric-aware ordering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileKey(pub String);

impl Ord for ProfileKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_profile_keys(&self.0, &other.0)
    }
}

impl PartialOrd for ProfileKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Registry of baseline records, owned by the session
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    machine_type: String,
    profiles: BTreeMap<ProfileKey, Arc<BaselineRecord>>,
}

impl ProfileRegistry {
    pub fn new(machine_type: impl Into<String>) -> Self {
        Self {
            machine_type: machine_type.into(),
            profiles: BTreeMap::new(),
        }
    }

    pub fn machine_type(&self) -> &str {
        &self.machine_type
    }

    /// Add or replace the record stored under its own key
    pub fn insert(&mut self, record: BaselineRecord) -> Option<Arc<BaselineRecord>> {
        self.profiles
            .insert(ProfileKey(record.key.clone()), Arc::new(record))
    }

    pub fn get(&self, key: &str) -> Option<Arc<BaselineRecord>> {
        self.profiles.get(&ProfileKey(key.to_string())).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.profiles.contains_key(&ProfileKey(key.to_string()))
    }

    /// Keys in ascending numeric-aware order
    pub fn keys(&self) -> Vec<String> {
        self.profiles.keys().map(|k| k.0.clone()).collect()
    }

    /// Highest key; the profile selected when none is configured
    pub fn default_key(&self) -> Option<String> {
        self.profiles.keys().next_back().map(|k| k.0.clone())
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &Arc<BaselineRecord>> {
        self.profiles.values()
    }
}
