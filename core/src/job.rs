//! Jobs and their key/value data.
//!
//! The retry settings of a job travel in its [`JobDataMap`] as a JSON record under
//! [`RETRY_SETTINGS_KEY`], so any host that can persist string maps can persist them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::policy::RetryPolicy;

/// Data map key of the persisted [`RetryPolicy`] record.
pub const RETRY_SETTINGS_KEY: &str = "retry:ExpBackoffRetrySettings";

/// Group used when none is given.
pub const DEFAULT_GROUP: &str = "DEFAULT";

/// Identity of a job: a name unique within its group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobKey {
    /// Name within the group.
    pub name: String,
    /// Group name.
    pub group: String,
}

impl JobKey {
    /// Key in an explicit group.
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
        }
    }

    /// Key in [`DEFAULT_GROUP`].
    pub fn in_default_group(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_GROUP)
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}

/// String key/value store attached to a job or a trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobDataMap {
    entries: BTreeMap<String, String>,
}

impl JobDataMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry, returning the previous value.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    /// Look up an entry.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Remove an entry.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store `policy` as the persisted retry settings record.
    pub fn put_retry_policy(&mut self, policy: &RetryPolicy) -> Result<(), serde_json::Error> {
        let json = policy.to_json()?;
        self.put(RETRY_SETTINGS_KEY, json);
        Ok(())
    }

    /// Read the persisted retry settings record, if present.
    ///
    /// `Ok(None)` when the key is absent, `Err` when the record is malformed.
    pub fn retry_policy(&self) -> Result<Option<RetryPolicy>, serde_json::Error> {
        self.get(RETRY_SETTINGS_KEY)
            .map(RetryPolicy::from_json)
            .transpose()
    }
}

/// A unit of work known to the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDetail {
    /// Identity.
    pub key: JobKey,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Data made available to every run of the job.
    #[serde(default)]
    pub data: JobDataMap,
}

impl JobDetail {
    /// Job with an empty data map.
    pub fn new(key: JobKey) -> Self {
        Self {
            key,
            description: None,
            data: JobDataMap::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replace the data map.
    pub fn with_data(mut self, data: JobDataMap) -> Self {
        self.data = data;
        self
    }

    /// Attach a persisted retry policy.
    pub fn with_retry_policy(mut self, policy: &RetryPolicy) -> Result<Self, serde_json::Error> {
        self.data.put_retry_policy(policy)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::MaxRetries;
    use chrono::TimeDelta;

    #[test]
    fn test_job_key_display() {
        assert_eq!(JobKey::new("report", "nightly").to_string(), "nightly.report");
        assert_eq!(JobKey::in_default_group("sync").group, DEFAULT_GROUP);
    }

    #[test]
    fn test_retry_policy_record() {
        let mut data = JobDataMap::new();
        assert!(data.retry_policy().unwrap().is_none());

        let policy = RetryPolicy::new()
            .backoff_base_interval(TimeDelta::seconds(90))
            .max_retries(MaxRetries::Limited(2));
        data.put_retry_policy(&policy).unwrap();

        assert!(data.get(RETRY_SETTINGS_KEY).is_some());
        assert_eq!(data.retry_policy().unwrap(), Some(policy));
    }

    #[test]
    fn test_malformed_retry_record_is_an_error() {
        let mut data = JobDataMap::new();
        data.put(RETRY_SETTINGS_KEY, "{not json");
        assert!(data.retry_policy().is_err());
    }

    #[test]
    fn test_job_detail_builder() {
        let job = JobDetail::new(JobKey::in_default_group("export"))
            .with_description("export ledger")
            .with_retry_policy(&RetryPolicy::new())
            .unwrap();
        assert_eq!(job.description.as_deref(), Some("export ledger"));
        assert_eq!(job.data.len(), 1);
    }
}
