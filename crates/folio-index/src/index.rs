//! The entry index: derived lookup maps over a flat row store.
//!
//! One row per entry version. Construction is O(n) over rows; lookup by any
//! single indexed field is O(1) amortized to the match-set size. The maps
//! are derived, never authoritative — they are rebuilt whenever the row
//! snapshot changes and carry no state of their own.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use folio_types::{EntryRow, EntryStatus};

/// Position of a row within the snapshot the index was built from.
pub type RowId = usize;

/// In-memory lookup structures over an entry snapshot.
pub struct EntryIndex {
    rows: Vec<EntryRow>,
    by_id: BTreeMap<String, Vec<RowId>>,
    by_type: HashMap<String, Vec<RowId>>,
    by_workspace: HashMap<String, Vec<RowId>>,
    by_root: HashMap<String, Vec<RowId>>,
    by_locale: HashMap<Option<String>, Vec<RowId>>,
    by_status: HashMap<EntryStatus, Vec<RowId>>,
    by_parent: HashMap<String, Vec<RowId>>,
}

impl EntryIndex {
    /// Build the index from a row snapshot.
    ///
    /// Within each match set, rows keep their original relative order.
    pub fn build(rows: Vec<EntryRow>) -> Self {
        let mut index = Self {
            rows,
            by_id: BTreeMap::new(),
            by_type: HashMap::new(),
            by_workspace: HashMap::new(),
            by_root: HashMap::new(),
            by_locale: HashMap::new(),
            by_status: HashMap::new(),
            by_parent: HashMap::new(),
        };
        for (row_id, row) in index.rows.iter().enumerate() {
            index.by_id.entry(row.id.clone()).or_default().push(row_id);
            index
                .by_type
                .entry(row.type_name.clone())
                .or_default()
                .push(row_id);
            index
                .by_workspace
                .entry(row.workspace.clone())
                .or_default()
                .push(row_id);
            index
                .by_root
                .entry(row.root.clone())
                .or_default()
                .push(row_id);
            index
                .by_locale
                .entry(row.locale.clone())
                .or_default()
                .push(row_id);
            index
                .by_status
                .entry(row.status)
                .or_default()
                .push(row_id);
            if let Some(parent) = &row.parent {
                index
                    .by_parent
                    .entry(parent.clone())
                    .or_default()
                    .push(row_id);
            }
        }
        index
    }

    /// Number of rows in the snapshot.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the snapshot has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows, in snapshot order.
    pub fn rows(&self) -> &[EntryRow] {
        &self.rows
    }

    /// A row by its position.
    pub fn row(&self, id: RowId) -> &EntryRow {
        &self.rows[id]
    }

    /// Rows carrying the given node id, in original relative order.
    pub fn get(&self, id: &str) -> &[RowId] {
        self.by_id.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Rows whose node id falls in `[gte, lt)`, ordered by id.
    pub fn range(&self, gte: &str, lt: &str) -> Vec<RowId> {
        self.by_id
            .range::<str, _>((Bound::Included(gte), Bound::Excluded(lt)))
            .flat_map(|(_, rows)| rows.iter().copied())
            .collect()
    }

    /// Rows of the given type.
    pub fn by_type(&self, type_name: &str) -> &[RowId] {
        self.by_type.get(type_name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Rows in the given workspace.
    pub fn by_workspace(&self, workspace: &str) -> &[RowId] {
        self.by_workspace
            .get(workspace)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Rows in the given root.
    pub fn by_root(&self, root: &str) -> &[RowId] {
        self.by_root.get(root).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Rows with the given locale (`None` for unlocalized rows).
    pub fn by_locale(&self, locale: Option<&str>) -> &[RowId] {
        self.by_locale
            .get(&locale.map(str::to_string))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Rows in the given lifecycle state.
    pub fn by_status(&self, status: EntryStatus) -> &[RowId] {
        self.by_status.get(&status).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Child rows of the given parent node id.
    pub fn children_of(&self, parent: &str) -> &[RowId] {
        self.by_parent.get(parent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ancestor node ids of a row, outermost first, from the materialized
    /// parent chain.
    pub fn ancestors_of(&self, row_id: RowId) -> &[String] {
        &self.rows[row_id].parent_chain
    }
}

impl std::fmt::Debug for EntryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryIndex")
            .field("rows", &self.rows.len())
            .field("ids", &self.by_id.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_types::Digest;

    pub(crate) fn row(id: &str) -> EntryRow {
        row_with(id, "Page", "main", "pages", None, EntryStatus::Published)
    }

    pub(crate) fn row_with(
        id: &str,
        type_name: &str,
        workspace: &str,
        root: &str,
        locale: Option<&str>,
        status: EntryStatus,
    ) -> EntryRow {
        EntryRow {
            id: id.to_string(),
            type_name: type_name.to_string(),
            workspace: workspace.to_string(),
            root: root.to_string(),
            locale: locale.map(str::to_string),
            status,
            index: "a0".to_string(),
            parent: None,
            parent_chain: Vec::new(),
            segment: id.to_string(),
            file_path: format!("{workspace}/{root}/{id}.json"),
            content_hash: Digest::null(),
            data: serde_json::json!({}),
        }
    }

    #[test]
    fn duplicate_ids_keep_original_relative_order() {
        let index = EntryIndex::build(vec![
            row("a"),
            row("c"),
            row("a"),
            row("b"),
            row("d"),
        ]);
        // Both 'a' rows, in snapshot order: positions 0 then 2.
        assert_eq!(index.get("a"), &[0, 2]);
    }

    #[test]
    fn range_is_half_open_and_key_sorted() {
        let index = EntryIndex::build(vec![
            row("a"),
            row("c"),
            row("a"),
            row("b"),
            row("d"),
        ]);
        let matched: Vec<&str> = index
            .range("b", "d")
            .into_iter()
            .map(|r| index.row(r).id.as_str())
            .collect();
        assert_eq!(matched, vec!["b", "c"]);
    }

    #[test]
    fn lookup_by_every_indexed_field() {
        let index = EntryIndex::build(vec![
            row_with("a", "Page", "main", "pages", Some("en"), EntryStatus::Published),
            row_with("b", "Post", "main", "blog", Some("de"), EntryStatus::Draft),
            row_with("c", "Page", "demo", "pages", None, EntryStatus::Archived),
        ]);
        assert_eq!(index.by_type("Page"), &[0, 2]);
        assert_eq!(index.by_workspace("main"), &[0, 1]);
        assert_eq!(index.by_root("pages"), &[0, 2]);
        assert_eq!(index.by_locale(Some("en")), &[0]);
        assert_eq!(index.by_locale(None), &[2]);
        assert_eq!(index.by_status(EntryStatus::Draft), &[1]);
        assert_eq!(index.by_type("Missing"), &[] as &[RowId]);
    }

    #[test]
    fn parent_index_tracks_children() {
        let mut child = row("child");
        child.parent = Some("parent".to_string());
        child.parent_chain = vec!["parent".to_string()];
        let index = EntryIndex::build(vec![row("parent"), child]);
        assert_eq!(index.children_of("parent"), &[1]);
        assert_eq!(index.ancestors_of(1), &["parent".to_string()]);
        assert!(index.children_of("child").is_empty());
    }

    #[test]
    fn rebuild_is_deterministic() {
        let rows = vec![row("a"), row("b"), row("a")];
        let first = EntryIndex::build(rows.clone());
        let second = EntryIndex::build(rows);
        assert_eq!(first.get("a"), second.get("a"));
        assert_eq!(first.len(), second.len());
    }
}
