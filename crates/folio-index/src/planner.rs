//! The query planner: index intersection before predicate evaluation.
//!
//! Given candidate ids, a pre-filter with its own node domain, and a
//! residual predicate, the planner resolves both domains through the index
//! and intersects them *before* any per-row predicate runs. Index
//! intersection is far cheaper than evaluating a full predicate against
//! every row, especially once a workspace/root/type filter has narrowed the
//! domain ahead of any payload-derived condition.

use std::collections::HashSet;

use folio_types::EntryRow;

use crate::index::{EntryIndex, RowId};

/// A per-row residual predicate, evaluated lazily per candidate.
pub type Predicate = Box<dyn Fn(&EntryRow) -> bool + Send + Sync>;

/// One node-level condition of a pre-filter: a node id plus an optional
/// locale narrowing applied to that node's rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeCondition {
    /// The node id this condition selects.
    pub id: String,
    /// Restrict the node's rows to this locale, when set.
    pub locale: Option<String>,
}

/// An already-known row-id domain derived from node-level conditions,
/// plus a predicate the pre-filter contributes.
pub struct PreFilter {
    /// The node domain. Resolved independently through the by-node-id
    /// index, with per-node locale narrowing.
    pub nodes: Vec<NodeCondition>,
    /// Predicate contributed by the pre-filter, composed (AND) with the
    /// caller's own predicate.
    pub predicate: Option<Predicate>,
}

/// Input to the planner.
pub struct QueryInput {
    /// Explicit candidate node ids, if the caller knows them.
    pub ids: Option<Vec<String>>,
    /// Free-text search term, carried through unresolved.
    pub search: Option<String>,
    /// Node-level pre-filter.
    pub prefilter: Option<PreFilter>,
    /// The caller's residual predicate.
    pub predicate: Option<Predicate>,
}

/// The output plan: a minimal candidate set plus the composed residual
/// predicate, evaluated lazily per row.
pub struct QueryPlan {
    /// Candidate row ids after intersection. `None` means the whole
    /// snapshot remains in play (no narrowing input was given).
    pub candidates: Option<Vec<RowId>>,
    /// The (still unresolved) search term for the caller to evaluate.
    pub search: Option<String>,
    /// Pre-filter predicate AND caller predicate.
    pub predicate: Option<Predicate>,
}

impl QueryPlan {
    /// Lazily iterate the rows this plan selects.
    ///
    /// Restartable: each call walks the candidates from the start. The
    /// search term is not applied here; it stays on the plan for the
    /// caller.
    pub fn rows<'a>(&'a self, index: &'a EntryIndex) -> impl Iterator<Item = &'a EntryRow> + 'a {
        let all: Vec<RowId> = match &self.candidates {
            Some(candidates) => candidates.clone(),
            None => (0..index.len()).collect(),
        };
        all.into_iter().map(|id| index.row(id)).filter(move |row| {
            self.predicate.as_ref().map(|p| p(row)).unwrap_or(true)
        })
    }
}

/// Build a query plan over the given index.
pub fn plan(index: &EntryIndex, input: QueryInput) -> QueryPlan {
    // 1. Resolve explicit ids into rows, deduplicating (a single node id
    //    resolves to several status/locale rows).
    let from_ids: Option<Vec<RowId>> = input.ids.as_ref().map(|ids| {
        let mut seen = HashSet::new();
        ids.iter()
            .flat_map(|id| index.get(id).iter().copied())
            .filter(|row| seen.insert(*row))
            .collect()
    });

    // 2. Resolve the pre-filter's node domain independently, applying
    //    the per-node locale narrowing.
    let (from_nodes, prefilter_predicate) = match input.prefilter {
        Some(prefilter) => {
            let resolved: Option<Vec<RowId>> = if prefilter.nodes.is_empty() {
                None
            } else {
                let mut seen = HashSet::new();
                Some(
                    prefilter
                        .nodes
                        .iter()
                        .flat_map(|condition| {
                            index
                                .get(&condition.id)
                                .iter()
                                .copied()
                                .filter(|row| match &condition.locale {
                                    Some(locale) => {
                                        index.row(*row).locale.as_deref() == Some(locale)
                                    }
                                    None => true,
                                })
                                .collect::<Vec<_>>()
                        })
                        .filter(|row| seen.insert(*row))
                        .collect(),
                )
            };
            (resolved, prefilter.predicate)
        }
        None => (None, None),
    };

    // 3. Intersect the two candidate sets. This is the cost-reduction
    //    step, done before any per-row predicate evaluation.
    let candidates = match (from_ids, from_nodes) {
        (Some(a), Some(b)) => {
            let keep: HashSet<RowId> = b.into_iter().collect();
            Some(a.into_iter().filter(|row| keep.contains(row)).collect())
        }
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    };

    // 4. Compose the predicates; both must hold.
    let predicate: Option<Predicate> = match (prefilter_predicate, input.predicate) {
        (Some(pre), Some(residual)) => {
            Some(Box::new(move |row| pre(row) && residual(row)))
        }
        (Some(pre), None) => Some(pre),
        (None, Some(residual)) => Some(residual),
        (None, None) => None,
    };

    QueryPlan {
        candidates,
        search: input.search,
        predicate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_types::{Digest, EntryStatus};

    fn row(id: &str, locale: Option<&str>, status: EntryStatus) -> EntryRow {
        EntryRow {
            id: id.to_string(),
            type_name: "Page".to_string(),
            workspace: "main".to_string(),
            root: "pages".to_string(),
            locale: locale.map(str::to_string),
            status,
            index: "a0".to_string(),
            parent: None,
            parent_chain: Vec::new(),
            segment: id.to_string(),
            file_path: format!("main/pages/{id}.json"),
            content_hash: Digest::null(),
            data: serde_json::json!({"title": id}),
        }
    }

    fn sample_index() -> EntryIndex {
        EntryIndex::build(vec![
            row("a", Some("en"), EntryStatus::Published), // 0
            row("a", Some("de"), EntryStatus::Published), // 1
            row("a", Some("en"), EntryStatus::Draft),     // 2
            row("b", None, EntryStatus::Published),       // 3
            row("c", None, EntryStatus::Draft),           // 4
        ])
    }

    fn empty_input() -> QueryInput {
        QueryInput {
            ids: None,
            search: None,
            prefilter: None,
            predicate: None,
        }
    }

    #[test]
    fn ids_resolve_to_all_variant_rows() {
        let index = sample_index();
        let plan = plan(&index, QueryInput {
            ids: Some(vec!["a".to_string()]),
            ..empty_input()
        });
        assert_eq!(plan.candidates, Some(vec![0, 1, 2]));
    }

    #[test]
    fn duplicate_ids_are_deduplicated() {
        let index = sample_index();
        let plan = plan(&index, QueryInput {
            ids: Some(vec!["a".to_string(), "a".to_string(), "b".to_string()]),
            ..empty_input()
        });
        assert_eq!(plan.candidates, Some(vec![0, 1, 2, 3]));
    }

    #[test]
    fn prefilter_applies_per_node_locale_narrowing() {
        let index = sample_index();
        let plan = plan(&index, QueryInput {
            prefilter: Some(PreFilter {
                nodes: vec![NodeCondition {
                    id: "a".to_string(),
                    locale: Some("en".to_string()),
                }],
                predicate: None,
            }),
            ..empty_input()
        });
        // Both 'en' rows of node a, the 'de' row excluded.
        assert_eq!(plan.candidates, Some(vec![0, 2]));
    }

    #[test]
    fn intersection_runs_before_predicates() {
        let index = sample_index();
        let plan = plan(&index, QueryInput {
            ids: Some(vec!["a".to_string(), "b".to_string()]),
            prefilter: Some(PreFilter {
                nodes: vec![
                    NodeCondition { id: "a".to_string(), locale: Some("de".to_string()) },
                    NodeCondition { id: "c".to_string(), locale: None },
                ],
                predicate: None,
            }),
            ..empty_input()
        });
        // ids → {0,1,2,3}; prefilter → {1,4}; intersection → {1}.
        assert_eq!(plan.candidates, Some(vec![1]));
    }

    #[test]
    fn predicates_compose_with_and() {
        let index = sample_index();
        let plan = plan(&index, QueryInput {
            prefilter: Some(PreFilter {
                nodes: Vec::new(),
                predicate: Some(Box::new(|row| row.status == EntryStatus::Published)),
            }),
            predicate: Some(Box::new(|row| row.locale.is_none())),
            ..empty_input()
        });
        let ids: Vec<&str> = plan.rows(&index).map(|r| r.id.as_str()).collect();
        // Published AND unlocalized: only 'b'.
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn no_input_means_full_snapshot() {
        let index = sample_index();
        let plan = plan(&index, empty_input());
        assert!(plan.candidates.is_none());
        assert_eq!(plan.rows(&index).count(), index.len());
    }

    #[test]
    fn search_term_is_carried_unresolved() {
        let index = sample_index();
        let plan = plan(&index, QueryInput {
            search: Some("welcome".to_string()),
            ..empty_input()
        });
        assert_eq!(plan.search.as_deref(), Some("welcome"));
    }

    #[test]
    fn rows_iteration_is_restartable() {
        let index = sample_index();
        let plan = plan(&index, QueryInput {
            ids: Some(vec!["a".to_string()]),
            ..empty_input()
        });
        let first: Vec<&str> = plan.rows(&index).map(|r| r.id.as_str()).collect();
        let second: Vec<&str> = plan.rows(&index).map(|r| r.id.as_str()).collect();
        assert_eq!(first, second);
    }
}
