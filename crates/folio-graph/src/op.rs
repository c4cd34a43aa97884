//! Graph operations and their compilation into content mutations.
//!
//! Each operation reads the graph's current snapshot, validates its
//! preconditions, and compiles into a [`Task`]: the mutations to apply plus
//! per-path pins on the rows it read. Compilation never mutates anything; a
//! rejected operation leaves the tree untouched.

use folio_source::{CommitAuthority, Source};
use folio_types::{EntryRow, EntryStatus};

use crate::error::{GraphError, GraphResult};
use crate::fractional::key_between;
use crate::graph::Graph;
use crate::mutation::{Mutation, Task};

/// Where a created or moved entry lands among its siblings.
#[derive(Clone, Debug, Default)]
pub enum Insertion {
    /// Before all existing siblings.
    First,
    /// After all existing siblings.
    #[default]
    Last,
    /// Directly before the named sibling node.
    Before(String),
    /// Directly after the named sibling node.
    After(String),
}

/// Inputs for a create operation.
#[derive(Clone, Debug)]
pub struct CreateOp {
    /// Node id of the new entry.
    pub id: String,
    /// Schema type of the new entry.
    pub type_name: String,
    /// Workspace the entry lands in.
    pub workspace: String,
    /// Root within the workspace.
    pub root: String,
    /// Locale variant, if the root is localized.
    pub locale: Option<String>,
    /// Parent node id, or `None` for a root-level entry.
    pub parent: Option<String>,
    /// Sibling position.
    pub insert: Insertion,
    /// URL-safe path segment.
    pub segment: String,
    /// Document payload.
    pub data: serde_json::Value,
}

/// A mutation operation against the writeable graph.
#[derive(Clone, Debug)]
pub enum Op {
    /// Create a new draft entry.
    Create(CreateOp),
    /// Replace the draft payload of an entry, creating the draft from the
    /// published row when none exists.
    Update {
        id: String,
        locale: Option<String>,
        data: serde_json::Value,
    },
    /// Re-parent and/or reorder an entry. Changes only parent linkage and
    /// the order key.
    Move {
        id: String,
        parent: Option<String>,
        insert: Insertion,
    },
    /// Promote the draft (or, absent a draft, the archived row) to
    /// published.
    Publish { id: String, locale: Option<String> },
    /// Demote the published row to archived.
    Archive { id: String, locale: Option<String> },
    /// Drop the draft row, leaving any published row untouched.
    Discard { id: String, locale: Option<String> },
    /// Delete every row of the node and of its descendants.
    Remove { id: String },
    /// Add a content-addressed media blob under the workspace's media
    /// root.
    Upload {
        workspace: String,
        filename: String,
        contents: Vec<u8>,
    },
}

impl Op {
    /// Compile this operation against the graph's current snapshot.
    pub fn task<R>(&self, graph: &Graph<R>) -> GraphResult<Task>
    where
        R: Source + CommitAuthority,
    {
        match self {
            Op::Create(create) => compile_create(graph, create),
            Op::Update { id, locale, data } => {
                compile_update(graph, id, locale.as_deref(), data.clone())
            }
            Op::Move { id, parent, insert } => {
                compile_move(graph, id, parent.as_deref(), insert)
            }
            Op::Publish { id, locale } => compile_publish(graph, id, locale.as_deref()),
            Op::Archive { id, locale } => compile_archive(graph, id, locale.as_deref()),
            Op::Discard { id, locale } => compile_discard(graph, id, locale.as_deref()),
            Op::Remove { id } => compile_remove(graph, id),
            Op::Upload {
                workspace,
                filename,
                contents,
            } => Ok(compile_upload(graph, workspace, filename, contents.clone())),
        }
    }
}

/// Allocate an order key at the requested position among `siblings`
/// (distinct keys, sorted ascending).
fn allocate_key(
    keys: &[String],
    insert: &Insertion,
    key_of: impl Fn(&str) -> GraphResult<String>,
) -> GraphResult<String> {
    match insert {
        Insertion::First => key_between(None, keys.first().map(String::as_str)),
        Insertion::Last => key_between(keys.last().map(String::as_str), None),
        Insertion::Before(sibling) => {
            let at = key_of(sibling)?;
            let pos = keys.iter().position(|k| *k == at);
            let lower = pos
                .and_then(|p| p.checked_sub(1))
                .map(|p| keys[p].as_str());
            key_between(lower, Some(&at))
        }
        Insertion::After(sibling) => {
            let at = key_of(sibling)?;
            let pos = keys.iter().position(|k| *k == at);
            let upper = pos.and_then(|p| keys.get(p + 1)).map(String::as_str);
            key_between(Some(&at), upper)
        }
    }
}

fn compile_create<R>(graph: &Graph<R>, create: &CreateOp) -> GraphResult<Task>
where
    R: Source + CommitAuthority,
{
    graph.schema().get(&create.type_name)?;
    if !graph.index().get(&create.id).is_empty() {
        return Err(GraphError::DuplicateEntry {
            id: create.id.clone(),
        });
    }
    let data = graph.schema().decode(&create.type_name, create.data.clone())?;

    let mut task = Task::default();
    let parent_chain = match &create.parent {
        Some(parent_id) => {
            let parent = graph.head_row(parent_id)?;
            let parent_def = graph.schema().get(&parent.type_name)?;
            if !parent_def.allows_child(&create.type_name) {
                return Err(GraphError::RejectedByContains {
                    parent_type: parent.type_name.clone(),
                    child_type: create.type_name.clone(),
                });
            }
            task.checks.extend(graph.pin(parent));
            let mut chain = parent.parent_chain.clone();
            chain.push(parent.id.clone());
            chain
        }
        None => Vec::new(),
    };

    let siblings = graph.sibling_keys(
        &create.workspace,
        &create.root,
        create.parent.as_deref(),
        None,
    );
    let index = allocate_key(&siblings, &create.insert, |id| graph.order_key_of(id))?;

    let file_path = graph.entry_file_path(
        &create.workspace,
        &create.root,
        create.locale.as_deref(),
        &parent_chain,
        &create.segment,
        EntryStatus::Draft,
    )?;
    task.mutations.push(Mutation::Put {
        row: EntryRow {
            id: create.id.clone(),
            type_name: create.type_name.clone(),
            workspace: create.workspace.clone(),
            root: create.root.clone(),
            locale: create.locale.clone(),
            status: EntryStatus::Draft,
            index,
            parent: create.parent.clone(),
            parent_chain,
            segment: create.segment.clone(),
            file_path,
            content_hash: folio_types::Digest::null(),
            data,
        },
    });
    Ok(task)
}

fn compile_update<R>(
    graph: &Graph<R>,
    id: &str,
    locale: Option<&str>,
    data: serde_json::Value,
) -> GraphResult<Task>
where
    R: Source + CommitAuthority,
{
    let base = graph
        .row_of(id, locale, EntryStatus::Draft)
        .or_else(|| graph.row_of(id, locale, EntryStatus::Published))
        .ok_or_else(|| GraphError::UnknownEntry(id.to_string()))?;
    let data = graph.schema().decode(&base.type_name, data)?;

    let mut draft = base.clone();
    draft.status = EntryStatus::Draft;
    draft.data = data;
    draft.file_path = graph.entry_file_path(
        &draft.workspace,
        &draft.root,
        draft.locale.as_deref(),
        &draft.parent_chain,
        &draft.segment,
        EntryStatus::Draft,
    )?;

    let mut task = Task::default();
    task.checks.extend(graph.pin(base));
    task.mutations.push(Mutation::Put { row: draft });
    Ok(task)
}

fn compile_move<R>(
    graph: &Graph<R>,
    id: &str,
    parent: Option<&str>,
    insert: &Insertion,
) -> GraphResult<Task>
where
    R: Source + CommitAuthority,
{
    let rows: Vec<EntryRow> = graph.rows_of(id).into_iter().cloned().collect();
    if rows.is_empty() {
        return Err(GraphError::UnknownEntry(id.to_string()));
    }
    let moved_type = rows[0].type_name.clone();

    let mut task = Task::default();
    let parent_chain = match parent {
        Some(parent_id) => {
            if parent_id == id {
                return Err(GraphError::CircularMove { id: id.to_string() });
            }
            let parent_row = graph.head_row(parent_id)?;
            if parent_row.parent_chain.iter().any(|a| a == id) {
                return Err(GraphError::CircularMove { id: id.to_string() });
            }
            let parent_def = graph.schema().get(&parent_row.type_name)?;
            if !parent_def.allows_child(&moved_type) {
                return Err(GraphError::RejectedByContains {
                    parent_type: parent_row.type_name.clone(),
                    child_type: moved_type,
                });
            }
            task.checks.extend(graph.pin(parent_row));
            let mut chain = parent_row.parent_chain.clone();
            chain.push(parent_row.id.clone());
            chain
        }
        None => Vec::new(),
    };

    let siblings = graph.sibling_keys(&rows[0].workspace, &rows[0].root, parent, Some(id));
    let index = allocate_key(&siblings, insert, |sibling| graph.order_key_of(sibling))?;

    // Rewrite every row of the node: new linkage, new key, new path.
    for row in &rows {
        task.checks.extend(graph.pin(row));
        if let Some(removal) = graph.removal(row) {
            task.mutations.push(removal);
        }
        let mut moved = row.clone();
        moved.parent = parent.map(str::to_string);
        moved.parent_chain = parent_chain.clone();
        moved.index = index.clone();
        moved.file_path = graph.entry_file_path(
            &moved.workspace,
            &moved.root,
            moved.locale.as_deref(),
            &moved.parent_chain,
            &moved.segment,
            moved.status,
        )?;
        task.mutations.push(Mutation::Put { row: moved });
    }

    // Descendants keep their linkage but their chains and file paths carry
    // the moved node's new position.
    for row in graph.descendant_rows(id) {
        task.checks.extend(graph.pin(row));
        if let Some(removal) = graph.removal(row) {
            task.mutations.push(removal);
        }
        let position = match row.parent_chain.iter().position(|a| a == id) {
            Some(position) => position,
            None => continue,
        };
        let mut chain = parent_chain.clone();
        chain.push(id.to_string());
        chain.extend(row.parent_chain[position + 1..].iter().cloned());

        let mut updated = row.clone();
        updated.parent_chain = chain;
        updated.file_path = graph.entry_file_path(
            &updated.workspace,
            &updated.root,
            updated.locale.as_deref(),
            &updated.parent_chain,
            &updated.segment,
            updated.status,
        )?;
        task.mutations.push(Mutation::Put { row: updated });
    }
    Ok(task)
}

fn compile_publish<R>(graph: &Graph<R>, id: &str, locale: Option<&str>) -> GraphResult<Task>
where
    R: Source + CommitAuthority,
{
    let source = graph
        .row_of(id, locale, EntryStatus::Draft)
        .or_else(|| graph.row_of(id, locale, EntryStatus::Archived))
        .ok_or_else(|| GraphError::NoSuchRow {
            id: id.to_string(),
            status: EntryStatus::Draft,
        })?;

    let mut task = Task::default();
    task.checks.extend(graph.pin(source));
    if let Some(removal) = graph.removal(source) {
        task.mutations.push(removal);
    }
    // An existing published row is overwritten in place; its path equals
    // the new row's path.
    if let Some(published) = graph.row_of(id, locale, EntryStatus::Published) {
        task.checks.extend(graph.pin(published));
    }

    let mut published = source.clone();
    published.status = EntryStatus::Published;
    published.file_path = graph.entry_file_path(
        &published.workspace,
        &published.root,
        published.locale.as_deref(),
        &published.parent_chain,
        &published.segment,
        EntryStatus::Published,
    )?;
    task.mutations.push(Mutation::Put { row: published });
    Ok(task)
}

fn compile_archive<R>(graph: &Graph<R>, id: &str, locale: Option<&str>) -> GraphResult<Task>
where
    R: Source + CommitAuthority,
{
    let published = graph
        .row_of(id, locale, EntryStatus::Published)
        .ok_or_else(|| GraphError::NoSuchRow {
            id: id.to_string(),
            status: EntryStatus::Published,
        })?;

    let mut task = Task::default();
    task.checks.extend(graph.pin(published));
    if let Some(removal) = graph.removal(published) {
        task.mutations.push(removal);
    }
    let mut archived = published.clone();
    archived.status = EntryStatus::Archived;
    archived.file_path = graph.entry_file_path(
        &archived.workspace,
        &archived.root,
        archived.locale.as_deref(),
        &archived.parent_chain,
        &archived.segment,
        EntryStatus::Archived,
    )?;
    task.mutations.push(Mutation::Put { row: archived });
    Ok(task)
}

fn compile_discard<R>(graph: &Graph<R>, id: &str, locale: Option<&str>) -> GraphResult<Task>
where
    R: Source + CommitAuthority,
{
    let draft = graph
        .row_of(id, locale, EntryStatus::Draft)
        .ok_or_else(|| GraphError::NoSuchRow {
            id: id.to_string(),
            status: EntryStatus::Draft,
        })?;
    let mut task = Task::default();
    task.checks.extend(graph.pin(draft));
    if let Some(removal) = graph.removal(draft) {
        task.mutations.push(removal);
    }
    Ok(task)
}

fn compile_remove<R>(graph: &Graph<R>, id: &str) -> GraphResult<Task>
where
    R: Source + CommitAuthority,
{
    let rows = graph.rows_of(id);
    if rows.is_empty() {
        return Err(GraphError::UnknownEntry(id.to_string()));
    }
    let mut task = Task::default();
    for row in rows.into_iter().chain(graph.descendant_rows(id)) {
        task.checks.extend(graph.pin(row));
        if let Some(removal) = graph.removal(row) {
            task.mutations.push(removal);
        }
    }
    Ok(task)
}

fn compile_upload<R>(
    graph: &Graph<R>,
    workspace: &str,
    filename: &str,
    contents: Vec<u8>,
) -> Task
where
    R: Source + CommitAuthority,
{
    let digest = folio_object::hash_object(folio_object::ObjectKind::Blob, &contents);
    let path = graph.media_path(workspace, filename, digest);
    Task {
        mutations: vec![Mutation::Upload { path, contents }],
        checks: Vec::new(),
    }
}
