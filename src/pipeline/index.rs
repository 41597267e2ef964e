//! Remote index generation.
//!
//! Maps business keys (course codes or period labels) to the remote
//! identifiers that carry them, so local rows can be matched to existing
//! records.
//!
//! > Example: `{"MAT01": ["page_1", "page_7"], "FIS122": ["page_3"]}`
//!
//! Identifiers keep the order the store returned them in; that order is the
//! update priority. Matching consumes identifiers through [`RemoteIndex::claim`].

use std::collections::HashMap;

use crate::error::Result;
use crate::models::RemoteRecord;
use crate::storage::RecordStore;

/// Key to identifier-list mapping with first-seen key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteIndex {
    order: Vec<String>,
    ids: HashMap<String, Vec<String>>,
}

impl RemoteIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every record that has a business key.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a RemoteRecord>) -> Self {
        let mut index = Self::new();
        for record in records {
            match record.business_key() {
                Some(key) => index.insert(key, &record.id),
                None => log::debug!("Record {} has no business key, skipping", record.id),
            }
        }
        index
    }

    /// Append an identifier under `key`.
    pub fn insert(&mut self, key: &str, id: &str) {
        match self.ids.get_mut(key) {
            Some(ids) => ids.push(id.to_string()),
            None => {
                self.order.push(key.to_string());
                self.ids.insert(key.to_string(), vec![id.to_string()]);
            }
        }
    }

    /// Take the next identifier for `key`. The key disappears once its
    /// last identifier is claimed.
    pub fn claim(&mut self, key: &str) -> Option<String> {
        let ids = self.ids.get_mut(key)?;
        let id = ids.remove(0);
        if ids.is_empty() {
            self.ids.remove(key);
            self.order.retain(|k| k != key);
        }
        Some(id)
    }

    /// Next identifier for `key` without consuming it.
    pub fn peek(&self, key: &str) -> Option<&str> {
        self.ids
            .get(key)
            .and_then(|ids| ids.first())
            .map(String::as_str)
    }

    /// Remaining identifiers for `key`.
    pub fn ids(&self, key: &str) -> &[String] {
        self.ids.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Keys in first-seen order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.ids.contains_key(key)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Index of a timeline table: period records at the top level, course
/// records grouped under the period they are linked to.
#[derive(Debug, Clone, Default)]
pub struct TimelineIndex {
    /// Period label to period record identifiers
    pub periods: RemoteIndex,
    courses: HashMap<String, RemoteIndex>,
}

impl TimelineIndex {
    pub fn from_records(records: &[RemoteRecord]) -> Self {
        let periods = RemoteIndex::from_records(records.iter().filter(|r| r.parents.is_empty()));

        let mut by_parent: HashMap<String, Vec<&RemoteRecord>> = HashMap::new();
        for record in records {
            for parent in &record.parents {
                by_parent.entry(parent.clone()).or_default().push(record);
            }
        }
        let courses = by_parent
            .into_iter()
            .map(|(parent, children)| (parent, RemoteIndex::from_records(children)))
            .collect();

        Self { periods, courses }
    }

    /// Take the course index of one period. Unknown periods get an empty
    /// index.
    pub fn take_courses(&mut self, period_id: &str) -> RemoteIndex {
        self.courses.remove(period_id).unwrap_or_default()
    }
}

/// Fetch a table and index it by business key.
pub async fn build_index(store: &dyn RecordStore) -> Result<RemoteIndex> {
    let records = store.fetch_all().await?;
    let index = RemoteIndex::from_records(&records);
    log::info!(
        "Indexed {} records under {} keys from {}",
        records.len(),
        index.len(),
        store.table()
    );
    Ok(index)
}

/// Fetch a timeline table and index periods and their courses.
pub async fn build_timeline_index(store: &dyn RecordStore) -> Result<TimelineIndex> {
    let records = store.fetch_all().await?;
    let index = TimelineIndex::from_records(&records);
    log::info!(
        "Indexed {} periods from {} timeline records in {}",
        index.periods.len(),
        records.len(),
        store.table()
    );
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn records() -> Vec<RemoteRecord> {
        vec![
            RemoteRecord::new("p1", "MAT01"),
            RemoteRecord::new("p2", "FIS01"),
            RemoteRecord::new("p3", "MAT01"),
            RemoteRecord::new("p4", ""),
            RemoteRecord {
                id: "p5".into(),
                key: None,
                parents: vec![],
            },
        ]
    }

    #[test]
    fn test_groups_ids_in_first_seen_order() {
        let index = RemoteIndex::from_records(&records());

        assert_eq!(index.keys().collect::<Vec<_>>(), vec!["MAT01", "FIS01"]);
        assert_eq!(index.ids("MAT01"), ["p1", "p3"]);
        assert_eq!(index.ids("FIS01"), ["p2"]);
    }

    #[test]
    fn test_blank_keys_are_never_indexed() {
        let index = RemoteIndex::from_records(&records());
        assert!(!index.contains(""));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_claim_consumes_and_deletes_exhausted_keys() {
        let mut index = RemoteIndex::from_records(&records());

        assert_eq!(index.claim("MAT01").as_deref(), Some("p1"));
        assert_eq!(index.ids("MAT01"), ["p3"]);
        assert_eq!(index.claim("MAT01").as_deref(), Some("p3"));
        assert!(!index.contains("MAT01"));
        assert_eq!(index.claim("MAT01"), None);
        assert_eq!(index.keys().collect::<Vec<_>>(), vec!["FIS01"]);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut index = RemoteIndex::new();
        index.insert("2021.1", "t1");
        assert_eq!(index.peek("2021.1"), Some("t1"));
        assert_eq!(index.peek("2021.1"), Some("t1"));
        assert_eq!(index.peek("2021.2"), None);
    }

    #[test]
    fn test_timeline_index_splits_periods_and_courses() {
        let records = vec![
            RemoteRecord::new("t1", "2021.1"),
            RemoteRecord::new("c1", "MAT01").with_parent("t1"),
            RemoteRecord::new("c2", "MAT02").with_parent("t1"),
            RemoteRecord::new("t2", "2021.2"),
        ];

        let mut index = TimelineIndex::from_records(&records);
        assert_eq!(index.periods.keys().collect::<Vec<_>>(), vec!["2021.1", "2021.2"]);

        let courses = index.take_courses("t1");
        assert_eq!(courses.keys().collect::<Vec<_>>(), vec!["MAT01", "MAT02"]);
        assert!(index.take_courses("t1").is_empty());
        assert!(index.take_courses("t2").is_empty());
    }

    #[tokio::test]
    async fn test_build_index_from_store() {
        let store = MemoryStore::with_records("main", records());
        let index = build_index(&store).await.unwrap();
        assert_eq!(index.ids("MAT01"), ["p1", "p3"]);
    }

    #[tokio::test]
    async fn test_build_index_propagates_fetch_failure() {
        let store = MemoryStore::new("main").fail_fetch();
        assert!(build_index(&store).await.is_err());
    }
}
