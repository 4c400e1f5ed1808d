//! Persisted crawl records
//!
//! Field names on disk follow the established data layout (`total_chapters`,
//! `scraped_chapters`, ...) so existing data directories keep working.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One item discovered in the paginated catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub url: String,

    #[serde(rename = "total_chapters")]
    pub total_subitems: u32,

    #[serde(default)]
    pub status: String,

    /// Set when the entry is new or its chapter count changed at the last index write
    #[serde(default)]
    pub updated: bool,

    /// Site identifier, resolved lazily by enrichment
    #[serde(default)]
    pub id: Option<String>,
}

impl CatalogEntry {
    /// Builds the entry for a freshly scraped catalog row, comparing it
    /// against what the previous index knew about the same URL
    pub fn merged(
        url: String,
        total_subitems: u32,
        status: String,
        previous: Option<&CatalogEntry>,
    ) -> Self {
        let updated = match previous {
            None => true,
            Some(prev) => prev.total_subitems != total_subitems,
        };
        Self {
            url,
            total_subitems,
            status,
            updated,
            id: previous.and_then(|p| p.id.clone()),
        }
    }
}

/// The catalog index, keyed by item URL
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "CatalogFile", into = "CatalogFile")]
pub struct CatalogIndex {
    entries: BTreeMap<String, CatalogEntry>,
}

#[derive(Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    novels: Vec<CatalogEntry>,
}

impl From<CatalogFile> for CatalogIndex {
    fn from(file: CatalogFile) -> Self {
        let entries = file
            .novels
            .into_iter()
            .map(|entry| (entry.url.clone(), entry))
            .collect();
        Self { entries }
    }
}

impl From<CatalogIndex> for CatalogFile {
    fn from(index: CatalogIndex) -> Self {
        let novels: Vec<CatalogEntry> = index.entries.into_values().collect();
        Self {
            total: novels.len(),
            novels,
        }
    }
}

impl CatalogIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, url: &str) -> Option<&CatalogEntry> {
        self.entries.get(url)
    }

    /// Inserts or replaces the entry for its URL
    pub fn upsert(&mut self, entry: CatalogEntry) {
        self.entries.insert(entry.url.clone(), entry);
    }

    /// Records a resolved identifier; returns false if the URL is unknown
    pub fn set_id(&mut self, url: &str, id: &str) -> bool {
        match self.entries.get_mut(url) {
            Some(entry) => {
                entry.id = Some(id.to_string());
                true
            }
            None => false,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }
}

/// Descriptive metadata for one item plus the harvest watermark
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRecord {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub author: String,
    pub image_url: String,
    pub summary: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,

    #[serde(rename = "total_chapters")]
    pub total_subitems: u32,

    /// Length of the contiguous prefix of harvested chapters
    #[serde(rename = "scraped_chapters", default)]
    pub completed_subitems: u32,

    pub status: String,

    #[serde(rename = "url_source")]
    pub source_url: String,
}

impl DetailRecord {
    pub fn is_complete(&self) -> bool {
        self.completed_subitems >= self.total_subitems
    }

    /// Updates the known chapter count without ever dropping below the
    /// harvested prefix. Returns true if the record changed.
    pub fn refresh_total(&mut self, total: u32) -> bool {
        let total = total.max(self.completed_subitems);
        if total == self.total_subitems {
            return false;
        }
        self.total_subitems = total;
        true
    }

    /// Advances the watermark by one; refuses to pass the total
    pub fn advance(&mut self) -> bool {
        if self.completed_subitems >= self.total_subitems {
            return false;
        }
        self.completed_subitems += 1;
        true
    }
}

/// Title entry for one harvested chapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubitemEntry {
    #[serde(rename = "chapter_number")]
    pub index: u32,

    #[serde(rename = "chapter_title")]
    pub title: String,
}

/// Index-addressable, possibly incomplete chapter list for one item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "SubitemListFile", into = "SubitemListFile")]
pub struct SubitemList {
    pub total: u32,
    subitems: BTreeMap<u32, SubitemEntry>,
}

/// On disk the list is an array; legacy files may contain `null` holes
#[derive(Serialize, Deserialize)]
struct SubitemListFile {
    #[serde(default)]
    total: u32,
    #[serde(default)]
    chapters: Vec<Option<SubitemEntry>>,
}

impl From<SubitemListFile> for SubitemList {
    fn from(file: SubitemListFile) -> Self {
        let subitems = file
            .chapters
            .into_iter()
            .flatten()
            .map(|entry| (entry.index, entry))
            .collect();
        Self {
            total: file.total,
            subitems,
        }
    }
}

impl From<SubitemList> for SubitemListFile {
    fn from(list: SubitemList) -> Self {
        Self {
            total: list.total,
            chapters: list.subitems.into_values().map(Some).collect(),
        }
    }
}

impl SubitemList {
    pub fn new(total: u32) -> Self {
        Self {
            total,
            subitems: BTreeMap::new(),
        }
    }

    pub fn get(&self, index: u32) -> Option<&SubitemEntry> {
        self.subitems.get(&index)
    }

    pub fn contains(&self, index: u32) -> bool {
        self.subitems.contains_key(&index)
    }

    /// Records a chapter title; returns true if the list changed
    pub fn patch(&mut self, index: u32, title: &str) -> bool {
        let entry = SubitemEntry {
            index,
            title: title.to_string(),
        };
        if self.subitems.get(&index) == Some(&entry) {
            return false;
        }
        self.subitems.insert(index, entry);
        true
    }

    pub fn len(&self) -> usize {
        self.subitems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subitems.is_empty()
    }

    /// Indices in `1..=total` with no entry
    pub fn gaps(&self) -> Vec<u32> {
        (1..=self.total)
            .filter(|index| !self.subitems.contains_key(index))
            .collect()
    }
}

/// Content of one harvested chapter; never rewritten once stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubitemContent {
    #[serde(rename = "chapter_number")]
    pub index: u32,

    #[serde(rename = "chapter_title")]
    pub title: String,

    #[serde(rename = "chapter_content")]
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str, total: u32) -> CatalogEntry {
        CatalogEntry {
            url: url.to_string(),
            total_subitems: total,
            status: "Ongoing".to_string(),
            updated: false,
            id: None,
        }
    }

    #[test]
    fn test_merge_absent_entry_is_updated() {
        let merged = CatalogEntry::merged("u".into(), 10, "Ongoing".into(), None);
        assert!(merged.updated);
        assert_eq!(merged.id, None);
    }

    #[test]
    fn test_merge_same_count_is_not_updated() {
        let mut prev = entry("u", 10);
        prev.updated = true;
        prev.id = Some("42".to_string());

        let merged = CatalogEntry::merged("u".into(), 10, "Completed".into(), Some(&prev));
        assert!(!merged.updated);
        assert_eq!(merged.id.as_deref(), Some("42"));
        assert_eq!(merged.status, "Completed");
    }

    #[test]
    fn test_merge_changed_count_is_updated() {
        let prev = entry("u", 10);
        let merged = CatalogEntry::merged("u".into(), 12, "Ongoing".into(), Some(&prev));
        assert!(merged.updated);
    }

    #[test]
    fn test_catalog_file_shape() {
        let mut index = CatalogIndex::new();
        index.upsert(entry("https://b.example/n.html", 3));
        index.upsert(entry("https://a.example/n.html", 5));

        let json = serde_json::to_value(&index).unwrap();
        assert_eq!(json["total"], 2);
        assert_eq!(json["novels"][0]["url"], "https://a.example/n.html");
        assert_eq!(json["novels"][0]["total_chapters"], 5);
        assert!(json["novels"][0]["id"].is_null());
    }

    #[test]
    fn test_catalog_reads_minimal_entries() {
        let json = r#"{"novels":[{"url":"https://x/n.html","total_chapters":7}]}"#;
        let index: CatalogIndex = serde_json::from_str(json).unwrap();
        let entry = index.get("https://x/n.html").unwrap();
        assert_eq!(entry.total_subitems, 7);
        assert!(!entry.updated);
        assert_eq!(entry.status, "");
    }

    #[test]
    fn test_set_id_unknown_url() {
        let mut index = CatalogIndex::new();
        assert!(!index.set_id("missing", "1"));
        index.upsert(entry("known", 1));
        assert!(index.set_id("known", "1"));
        assert_eq!(index.get("known").unwrap().id.as_deref(), Some("1"));
    }

    fn detail(total: u32, completed: u32) -> DetailRecord {
        DetailRecord {
            id: "1".into(),
            slug: "s".into(),
            title: "T".into(),
            author: "A".into(),
            image_url: "i".into(),
            summary: "<p>s</p>".into(),
            categories: vec!["Fantasy".into()],
            tags: vec![],
            total_subitems: total,
            completed_subitems: completed,
            status: "Ongoing".into(),
            source_url: "u".into(),
        }
    }

    #[test]
    fn test_detail_advance_stops_at_total() {
        let mut record = detail(2, 1);
        assert!(record.advance());
        assert_eq!(record.completed_subitems, 2);
        assert!(!record.advance());
        assert_eq!(record.completed_subitems, 2);
        assert!(record.is_complete());
    }

    #[test]
    fn test_refresh_total_never_below_watermark() {
        let mut record = detail(10, 8);
        assert!(record.refresh_total(12));
        assert_eq!(record.total_subitems, 12);
        assert!(!record.refresh_total(12));

        assert!(record.refresh_total(5));
        assert_eq!(record.total_subitems, 8);
        assert_eq!(record.completed_subitems, 8);
    }

    #[test]
    fn test_detail_field_names() {
        let json = serde_json::to_value(detail(10, 3)).unwrap();
        assert_eq!(json["total_chapters"], 10);
        assert_eq!(json["scraped_chapters"], 3);
        assert_eq!(json["url_source"], "u");
    }

    #[test]
    fn test_subitem_list_reads_legacy_holes() {
        let json = r#"{"total":4,"chapters":[{"chapter_number":1,"chapter_title":"One"},null,{"chapter_number":3,"chapter_title":"Three"}]}"#;
        let list: SubitemList = serde_json::from_str(json).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.contains(3));
        assert_eq!(list.gaps(), vec![2, 4]);
    }

    #[test]
    fn test_subitem_list_writes_dense_array() {
        let mut list = SubitemList::new(5);
        assert!(list.patch(4, "Four"));
        assert!(list.patch(2, "Two"));
        assert!(!list.patch(2, "Two"));

        let json = serde_json::to_value(&list).unwrap();
        let chapters = json["chapters"].as_array().unwrap();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0]["chapter_number"], 2);
        assert_eq!(chapters[1]["chapter_title"], "Four");
    }
}
