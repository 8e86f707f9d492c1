use std::collections::HashMap;
use std::sync::RwLock;

use crate::caption;

/// One stored upload awaiting (or past) publication. Immutable once created.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub raw_caption: Option<String>,
    pub normalized_caption: String,
    pub storage_item_id: i32,
    pub access_token: String,
    pub delivery_link: String,
}

/// Per-admin accumulation of pending uploads.
///
/// `std::sync::RwLock` map, never held across `.await`. Contents do not
/// survive a restart.
#[derive(Default)]
pub struct BatchStore {
    inner: RwLock<HashMap<i64, Vec<FileRecord>>>,
}

impl BatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record, creating the queue on first use. Returns the running
    /// count.
    pub fn add(&self, admin_id: i64, record: FileRecord) -> usize {
        match self.inner.write() {
            Ok(mut map) => {
                let queue = map.entry(admin_id).or_default();
                queue.push(record);
                queue.len()
            }
            Err(_) => 0,
        }
    }

    /// Copy of the current queue, in insertion order.
    pub fn snapshot(&self, admin_id: i64) -> Vec<FileRecord> {
        self.inner
            .read()
            .ok()
            .and_then(|map| map.get(&admin_id).cloned())
            .unwrap_or_default()
    }

    /// Discard the queue entirely.
    pub fn clear(&self, admin_id: i64) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(&admin_id);
        }
    }

    pub fn len(&self, admin_id: i64) -> usize {
        self.inner
            .read()
            .ok()
            .map(|map| map.get(&admin_id).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, admin_id: i64) -> bool {
        self.len(admin_id) == 0
    }
}

/// Records sharing one group key, rendered as one outbound message.
#[derive(Debug, Clone)]
pub struct RenderUnit {
    pub group_key: String,
    pub records: Vec<FileRecord>,
}

/// Partition records into groups keyed by `caption::group_key`, preserving
/// first-seen group order and within-group insertion order.
pub fn group_records(records: &[FileRecord]) -> Vec<RenderUnit> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<FileRecord>> = HashMap::new();
    for record in records {
        let key = caption::group_key(record.raw_caption.as_deref());
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(record.clone());
    }
    order
        .into_iter()
        .map(|key| {
            let records = groups.remove(&key).unwrap_or_default();
            RenderUnit {
                group_key: key,
                records,
            }
        })
        .collect()
}

/// Escape caption text for inclusion in Telegram HTML.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Render one group as a single HTML message body, pairing each record's
/// caption with its delivery link.
pub fn render_group(unit: &RenderUnit) -> String {
    let mut text = String::new();
    for record in &unit.records {
        text.push_str(&format!(
            "🔹 <a href=\"{}\">{}</a>\n\n",
            record.delivery_link,
            escape_html(&record.normalized_caption)
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(caption: &str, id: i32) -> FileRecord {
        FileRecord {
            raw_caption: Some(caption.to_string()),
            normalized_caption: caption::normalize(Some(caption)),
            storage_item_id: id,
            access_token: format!("tok{id}"),
            delivery_link: format!("https://t.me/bot?start=tok{id}"),
        }
    }

    #[test]
    fn add_returns_running_count() {
        let store = BatchStore::new();
        assert_eq!(store.add(1, record("A", 1)), 1);
        assert_eq!(store.add(1, record("B", 2)), 2);
        assert_eq!(store.len(1), 2);
    }

    #[test]
    fn snapshot_preserves_insertion_order() {
        let store = BatchStore::new();
        store.add(1, record("first", 1));
        store.add(1, record("second", 2));
        let snap = store.snapshot(1);
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].storage_item_id, 1);
        assert_eq!(snap[1].storage_item_id, 2);
    }

    #[test]
    fn snapshot_leaves_queue_intact() {
        let store = BatchStore::new();
        store.add(1, record("A", 1));
        let _ = store.snapshot(1);
        assert_eq!(store.len(1), 1);
    }

    #[test]
    fn clear_discards_queue() {
        let store = BatchStore::new();
        store.add(1, record("A", 1));
        store.clear(1);
        assert!(store.is_empty(1));
        assert!(store.snapshot(1).is_empty());
    }

    #[test]
    fn clear_absent_queue_is_noop() {
        let store = BatchStore::new();
        store.clear(99);
        assert!(store.is_empty(99));
    }

    #[test]
    fn queues_isolated_per_admin() {
        let store = BatchStore::new();
        store.add(1, record("A", 1));
        assert!(store.is_empty(2));
    }

    #[test]
    fn grouping_preserves_first_seen_order() {
        let records = vec![
            record("Dune Part Two extra", 1),
            record("Arrival 2016", 2),
            record("Dune Part Two bonus", 3),
        ];
        let units = group_records(&records);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].group_key, "dune part");
        assert_eq!(units[1].group_key, "arrival 2016");
        let ids: Vec<i32> = units[0].records.iter().map(|r| r.storage_item_id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn captionless_records_group_as_unknown() {
        let mut rec = record("", 1);
        rec.raw_caption = None;
        let units = group_records(&[rec]);
        assert_eq!(units[0].group_key, caption::UNKNOWN_GROUP);
    }

    #[test]
    fn escape_html_handles_markup() {
        assert_eq!(
            escape_html("<b>Movie & Show</b>"),
            "&lt;b&gt;Movie &amp; Show&lt;/b&gt;"
        );
    }

    #[test]
    fn render_pairs_caption_with_link() {
        let unit = RenderUnit {
            group_key: "dune part".into(),
            records: vec![record("Dune Part Two <4K>", 1)],
        };
        let html = render_group(&unit);
        assert!(html.contains("https://t.me/bot?start=tok1"));
        assert!(html.contains("Dune Part Two &lt;4K&gt;"));
        assert!(!html.contains("<4K>"));
    }
}
