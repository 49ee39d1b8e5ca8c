use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Host-assigned tab handle. The engine never holds a pointer to the host tab,
/// only this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub i64);

impl TabId {
    /// Sentinel used by the persisted format for "no tab".
    pub const NONE: TabId = TabId(-1);

    pub fn is_valid(self) -> bool {
        self.0 > Self::NONE.0
    }
}

impl Default for TabId {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// URLs that on their own make a snapshot not worth keeping.
pub const PLACEHOLDER_URLS: [&str; 2] = ["about:home", "about:privatebrowsing"];

/// One entry of a tab's navigation history.
///
/// Only `url` and `title` are interpreted here; everything else the history
/// codec produced is carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl HistoryEntry {
    pub fn new(url: &str, title: Option<&str>) -> Self {
        Self {
            url: url.to_string(),
            title: title.map(str::to_string),
            extra: serde_json::Map::new(),
        }
    }
}

/// Form field values recorded for one frame, with the values for its child
/// frames nested in document order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FrameFormData {
    /// URL of the document the values were recorded from. Replay is skipped
    /// for the frame and its descendants when the loaded URL differs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Values keyed by element id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub id: BTreeMap<String, serde_json::Value>,
    /// Values keyed by XPath for elements without an id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub xpath: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Option<FrameFormData>>,
}

impl FrameFormData {
    /// True when neither this frame nor any descendant carries a value.
    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
            && self.xpath.is_empty()
            && self.children.iter().flatten().all(FrameFormData::is_empty)
    }
}

/// Scroll position within a document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct ScrollPosition {
    pub x: f64,
    pub y: f64,
}

/// Per-frame scroll positions, nested in document order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FrameScroll {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll: Option<ScrollPosition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Option<FrameScroll>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct DisplaySize {
    pub width: u32,
    pub height: u32,
}

/// Document resolution plus the viewport it was recorded in, so the content
/// layer can adapt the zoom to a different orientation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Zoom {
    pub resolution: f64,
    pub display_size: DisplaySize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScrollData {
    #[serde(flatten)]
    pub frames: FrameScroll,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<Zoom>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TabAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Persisted state of one tab.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TabSnapshot {
    #[serde(default)]
    pub entries: Vec<HistoryEntry>,
    /// 1-based position of the active entry.
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub attributes: TabAttributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_data: Option<FrameFormData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_data: Option<ScrollData>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub tab_id: TabId,
    #[serde(
        default,
        deserialize_with = "deserialize_parent_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<TabId>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ext_data: BTreeMap<String, String>,
    #[serde(default)]
    pub desktop_mode: bool,
}

/// Older files write `-1` for "no parent"; treat every invalid id as absent.
fn deserialize_parent_id<'de, D>(deserializer: D) -> Result<Option<TabId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<TabId> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|id| id.is_valid()))
}

impl TabSnapshot {
    /// Creates a snapshot with no history for the given tab.
    pub fn new(tab_id: TabId, is_private: bool) -> Self {
        Self {
            entries: Vec::new(),
            index: 0,
            attributes: TabAttributes::default(),
            form_data: None,
            scroll_data: None,
            is_private,
            tab_id,
            parent_id: None,
            ext_data: BTreeMap::new(),
            desktop_mode: false,
        }
    }

    /// A snapshot is empty when it has no history, or only a single
    /// placeholder page. Empty snapshots never enter the undo ring.
    pub fn is_empty(&self) -> bool {
        match self.entries.as_slice() {
            [] => true,
            [only] => PLACEHOLDER_URLS.contains(&only.url.as_str()),
            _ => false,
        }
    }

    /// True when `index` points at an existing entry.
    pub fn is_valid(&self) -> bool {
        !self.entries.is_empty() && self.index >= 1 && self.index <= self.entries.len()
    }

    pub fn active_entry(&self) -> Option<&HistoryEntry> {
        self.index
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
    }

    /// Drops every history entry except the active one.
    pub fn truncate_to_active(&mut self) {
        if let Some(active) = self.active_entry().cloned() {
            self.entries = vec![active];
            self.index = 1;
        }
    }
}
