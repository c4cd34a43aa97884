//! The entry query boundary consumed by adapters.
//!
//! A request object with optional indexed criteria, a free-text search
//! term, and a residual filter. Indexed criteria are resolved through the
//! [`EntryIndex`] maps and intersected before the planner composes the
//! residual predicate, so the per-row filter only ever sees the narrowed
//! candidate set.

use std::collections::HashSet;

use folio_types::EntryStatus;

use crate::index::{EntryIndex, RowId};
use crate::planner::{plan, Predicate, QueryInput, QueryPlan};

/// A query over an entry snapshot.
#[derive(Default)]
pub struct EntryQuery {
    /// Select rows of this node id.
    pub id: Option<String>,
    /// Select rows of this type.
    pub type_name: Option<String>,
    /// Select rows in this workspace.
    pub workspace: Option<String>,
    /// Select rows in this root.
    pub root: Option<String>,
    /// Select rows with this locale.
    pub locale: Option<String>,
    /// Select rows in this lifecycle state.
    pub status: Option<EntryStatus>,
    /// Free-text search term, carried to the caller unresolved.
    pub search: Option<String>,
    /// Residual filter, evaluated lazily per candidate row.
    pub filter: Option<Predicate>,
}

impl EntryQuery {
    /// Resolve the query into a plan over the given index.
    pub fn plan(self, index: &EntryIndex) -> QueryPlan {
        // Resolve each indexed criterion to its match set.
        let mut sets: Vec<Vec<RowId>> = Vec::new();
        if let Some(type_name) = &self.type_name {
            sets.push(index.by_type(type_name).to_vec());
        }
        if let Some(workspace) = &self.workspace {
            sets.push(index.by_workspace(workspace).to_vec());
        }
        if let Some(root) = &self.root {
            sets.push(index.by_root(root).to_vec());
        }
        if let Some(locale) = &self.locale {
            sets.push(index.by_locale(Some(locale)).to_vec());
        }
        if let Some(status) = self.status {
            sets.push(index.by_status(status).to_vec());
        }
        let field_candidates = intersect_all(sets);

        let mut plan = plan(
            index,
            QueryInput {
                ids: self.id.map(|id| vec![id]),
                search: self.search,
                prefilter: None,
                predicate: self.filter,
            },
        );
        plan.candidates = match (plan.candidates.take(), field_candidates) {
            (Some(a), Some(b)) => {
                let keep: HashSet<RowId> = b.into_iter().collect();
                Some(a.into_iter().filter(|row| keep.contains(row)).collect())
            }
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };
        plan
    }
}

/// Intersect match sets, smallest first, preserving that set's order.
fn intersect_all(mut sets: Vec<Vec<RowId>>) -> Option<Vec<RowId>> {
    if sets.is_empty() {
        return None;
    }
    sets.sort_by_key(Vec::len);
    let mut iter = sets.into_iter();
    let first = iter.next().expect("non-empty");
    let mut result = first;
    for set in iter {
        let keep: HashSet<RowId> = set.into_iter().collect();
        result.retain(|row| keep.contains(row));
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_types::{Digest, EntryRow};

    fn row(
        id: &str,
        type_name: &str,
        workspace: &str,
        status: EntryStatus,
        title: &str,
    ) -> EntryRow {
        EntryRow {
            id: id.to_string(),
            type_name: type_name.to_string(),
            workspace: workspace.to_string(),
            root: "pages".to_string(),
            locale: None,
            status,
            index: "a0".to_string(),
            parent: None,
            parent_chain: Vec::new(),
            segment: id.to_string(),
            file_path: format!("{workspace}/pages/{id}.json"),
            content_hash: Digest::null(),
            data: serde_json::json!({"title": title}),
        }
    }

    fn sample_index() -> EntryIndex {
        EntryIndex::build(vec![
            row("home", "Page", "main", EntryStatus::Published, "Home"), // 0
            row("about", "Page", "main", EntryStatus::Draft, "About"),   // 1
            row("news", "Post", "main", EntryStatus::Published, "News"), // 2
            row("home", "Page", "demo", EntryStatus::Published, "Demo"), // 3
        ])
    }

    #[test]
    fn filters_by_type_and_workspace() {
        let index = sample_index();
        let plan = EntryQuery {
            type_name: Some("Page".to_string()),
            workspace: Some("main".to_string()),
            ..Default::default()
        }
        .plan(&index);
        let ids: Vec<&str> = plan.rows(&index).map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["home", "about"]);
    }

    #[test]
    fn id_intersects_with_field_criteria() {
        let index = sample_index();
        let plan = EntryQuery {
            id: Some("home".to_string()),
            workspace: Some("demo".to_string()),
            ..Default::default()
        }
        .plan(&index);
        let rows: Vec<&EntryRow> = plan.rows(&index).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].workspace, "demo");
    }

    #[test]
    fn status_filter_narrows_before_residual() {
        let index = sample_index();
        let plan = EntryQuery {
            status: Some(EntryStatus::Published),
            filter: Some(Box::new(|row| {
                row.data["title"].as_str().is_some_and(|t| t.starts_with('N'))
            })),
            ..Default::default()
        }
        .plan(&index);
        // Candidates were narrowed to the published set before the
        // payload-derived filter ran.
        assert_eq!(plan.candidates.as_ref().map(Vec::len), Some(3));
        let ids: Vec<&str> = plan.rows(&index).map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["news"]);
    }

    #[test]
    fn unmatched_criteria_yield_empty_results() {
        let index = sample_index();
        let plan = EntryQuery {
            type_name: Some("Missing".to_string()),
            ..Default::default()
        }
        .plan(&index);
        assert_eq!(plan.rows(&index).count(), 0);
    }

    #[test]
    fn search_term_survives_planning() {
        let index = sample_index();
        let plan = EntryQuery {
            search: Some("hello".to_string()),
            ..Default::default()
        }
        .plan(&index);
        assert_eq!(plan.search.as_deref(), Some("hello"));
    }

    #[test]
    fn results_are_restartable() {
        let index = sample_index();
        let plan = EntryQuery {
            workspace: Some("main".to_string()),
            ..Default::default()
        }
        .plan(&index);
        assert_eq!(plan.rows(&index).count(), plan.rows(&index).count());
    }
}
