//! Column-set composition
//!
//! Turns the descriptor sets of every table in a composition into the
//! ordered column list of the view. Steps run in a fixed order:
//!
//! 1. concatenate sets, view key first
//! 2. skip
//! 3. fold parent key columns into the view key
//! 4. remap (after parent prefixes)
//! 5. reorder (`columns_on_top`, `columns_at_end`)
//! 6. key defaults (`pkey_default_values`)
//! 7. per-table value overrides (`insert_values`, `update_values`)
//!
//! Every directive must name something that exists; nothing is silently
//! ignored except a reorder directive on a skipped column.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{PirogueError, PirogueResult};
use crate::internal_error;
use crate::schema::definition::CompositionPolicy;
use crate::schema::{ColumnDescriptor, ColumnRole, OutputColumn, TableRef, ValueExpression};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableRole {
    Child,
    Parent,
}

/// Columns of one table, with the columns carrying the shared key
#[derive(Debug, Clone)]
pub struct DescriptorSet {
    pub table: TableRef,
    pub columns: Vec<ColumnDescriptor>,
    /// For the child, the first entry is the view key
    pub key_columns: Vec<String>,
    pub role: TableRole,
    pub prefix: Option<String>,
    /// Source column name -> INSERT expression
    pub insert_values: BTreeMap<String, String>,
    /// Source column name -> UPDATE expression
    pub update_values: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Live,
    Skipped,
    Folded,
}

#[derive(Debug)]
struct Candidate {
    column: OutputColumn,
    state: State,
}

impl Candidate {
    fn label(&self) -> String {
        format!("{}.{}", self.column.source_table_alias, self.column.name())
    }
}

/// Compose the view column list
pub fn compose(sets: &[DescriptorSet], policy: &CompositionPolicy) -> PirogueResult<Vec<OutputColumn>> {
    if sets.is_empty() {
        return Err(PirogueError::EmptyComposition);
    }

    let mut candidates = collect(sets)?;
    apply_skip(&mut candidates, policy)?;
    fold_keys(&mut candidates, policy.remove_pkey);
    apply_remap(&mut candidates, policy)?;
    check_unique(&candidates)?;

    let order = reorder(&candidates, policy)?;
    apply_key_defaults(&mut candidates, policy)?;
    for set in sets {
        apply_values(&mut candidates, set, &set.insert_values, "insert_values", insert_slot)?;
        apply_values(&mut candidates, set, &set.update_values, "update_values", update_slot)?;
    }

    let comment_skipped = policy.comment_skipped;
    let mut slots: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
    let mut columns = Vec::with_capacity(order.len());
    for idx in order {
        let Some(candidate) = slots[idx].take() else {
            return Err(internal_error!("column slot {} used twice", idx));
        };
        match candidate.state {
            State::Live => columns.push(candidate.column),
            State::Skipped if comment_skipped => {
                let mut column = candidate.column;
                column.comment_only = true;
                columns.push(column);
            }
            State::Skipped | State::Folded => {}
        }
    }
    Ok(columns)
}

/// Step 1: view key first, then every set in order
fn collect(sets: &[DescriptorSet]) -> PirogueResult<Vec<Candidate>> {
    let child = sets
        .iter()
        .find(|set| set.role == TableRole::Child)
        .ok_or_else(|| internal_error!("composition has no child table"))?;
    let view_key = child
        .key_columns
        .first()
        .ok_or_else(|| internal_error!("child {} has no key column", child.table.display_name()))?;
    let key_descriptor = child
        .columns
        .iter()
        .find(|column| &column.name == view_key)
        .ok_or_else(|| PirogueError::UnknownColumn {
            column: format!("{}.{}", child.table.source_alias(), view_key),
            directive: "view key",
        })?;

    let mut key = OutputColumn::new(key_descriptor.clone(), child.table.source_alias());
    key.role = ColumnRole::ViewKey;
    let mut candidates = vec![Candidate { column: key, state: State::Live }];

    for set in sets {
        let alias = set.table.source_alias();
        for descriptor in &set.columns {
            if set.role == TableRole::Child && &descriptor.name == view_key {
                continue;
            }
            let mut column = OutputColumn::new(descriptor.clone(), alias);
            if set.role == TableRole::Parent && set.key_columns.contains(&descriptor.name) {
                column.role = ColumnRole::JoinKey;
            } else if let Some(prefix) = &set.prefix {
                column.effective_name = format!("{}{}", prefix, descriptor.name);
            }
            candidates.push(Candidate { column, state: State::Live });
        }
    }
    Ok(candidates)
}

/// `col` matches that column in every table, `alias.col` in one table
fn matches(reference: &str, column: &OutputColumn) -> bool {
    if column.name() == reference {
        return true;
    }
    match reference.split_once('.') {
        Some((alias, name)) => column.source_table_alias == alias && column.name() == name,
        None => false,
    }
}

fn matching(candidates: &[Candidate], reference: &str) -> Vec<usize> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, candidate)| matches(reference, &candidate.column))
        .map(|(idx, _)| idx)
        .collect()
}

fn apply_skip(candidates: &mut [Candidate], policy: &CompositionPolicy) -> PirogueResult<()> {
    for reference in &policy.skip_columns {
        let hits = matching(candidates, reference);
        if hits.is_empty() {
            return Err(PirogueError::UnknownColumn {
                column: reference.clone(),
                directive: "skip_columns",
            });
        }
        for idx in hits {
            if candidates[idx].column.role == ColumnRole::ViewKey {
                return Err(PirogueError::ConflictingDirectives {
                    column: reference.clone(),
                    reason: "the view key cannot be skipped".to_string(),
                });
            }
            candidates[idx].state = State::Skipped;
        }
    }
    Ok(())
}

/// Step 3: parent key columns named like the view key collapse into it;
/// with `remove_pkey` every parent key column goes
fn fold_keys(candidates: &mut [Candidate], remove_pkey: bool) {
    let view_key = candidates
        .iter()
        .find(|candidate| candidate.column.role == ColumnRole::ViewKey)
        .map(|candidate| candidate.column.name().to_string());

    for candidate in candidates.iter_mut() {
        if candidate.column.role != ColumnRole::JoinKey {
            continue;
        }
        if remove_pkey || view_key.as_deref() == Some(candidate.column.name()) {
            candidate.state = State::Folded;
        }
    }
}

fn apply_remap(candidates: &mut [Candidate], policy: &CompositionPolicy) -> PirogueResult<()> {
    for (reference, target) in &policy.remap_columns {
        let hits = matching(candidates, reference);
        if hits.is_empty() {
            return Err(PirogueError::UnknownColumn {
                column: reference.clone(),
                directive: "remap_columns",
            });
        }
        if hits.iter().any(|&idx| candidates[idx].state == State::Skipped) {
            return Err(PirogueError::ConflictingDirectives {
                column: reference.clone(),
                reason: "column is both skipped and remapped".to_string(),
            });
        }
        if hits.iter().all(|&idx| candidates[idx].state == State::Folded) {
            return Err(PirogueError::ConflictingDirectives {
                column: reference.clone(),
                reason: "column is folded into the view key; remap the child key instead".to_string(),
            });
        }
        for idx in hits {
            if candidates[idx].state == State::Live {
                candidates[idx].column.effective_name = target.clone();
            }
        }
    }
    Ok(())
}

fn check_unique(candidates: &[Candidate]) -> PirogueResult<()> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for (idx, candidate) in candidates.iter().enumerate() {
        if candidate.state != State::Live {
            continue;
        }
        if let Some(&first) = seen.get(candidate.column.effective_name.as_str()) {
            return Err(PirogueError::DuplicateColumn {
                column: candidate.column.effective_name.clone(),
                first: candidates[first].label(),
                second: candidate.label(),
            });
        }
        seen.insert(candidate.column.effective_name.as_str(), idx);
    }
    Ok(())
}

fn check_reorder_list(names: &[String], directive: &str) -> PirogueResult<()> {
    let mut seen = BTreeSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(PirogueError::ConflictingDirectives {
                column: name.clone(),
                reason: format!("listed more than once in {directive}"),
            });
        }
    }
    Ok(())
}

/// Resolve a reorder directive to a live column; `None` for skipped ones
fn resolve_reordered(
    candidates: &[Candidate],
    name: &str,
    directive: &'static str,
) -> PirogueResult<Option<usize>> {
    if candidates
        .iter()
        .any(|c| c.column.role == ColumnRole::ViewKey && c.column.effective_name == name)
    {
        return Err(PirogueError::ConflictingDirectives {
            column: name.to_string(),
            reason: format!("the view key always leads the column list and cannot appear in {directive}"),
        });
    }

    if let Some(idx) = candidates
        .iter()
        .position(|c| c.state == State::Live && c.column.effective_name == name)
    {
        return Ok(Some(idx));
    }

    let skipped = candidates.iter().any(|c| {
        c.state == State::Skipped && (c.column.effective_name == name || matches(name, &c.column))
    });
    if skipped {
        return Ok(None);
    }

    Err(PirogueError::UnknownColumn {
        column: name.to_string(),
        directive,
    })
}

/// Step 5: returns candidate indices in output order
fn reorder(candidates: &[Candidate], policy: &CompositionPolicy) -> PirogueResult<Vec<usize>> {
    check_reorder_list(&policy.columns_on_top, "columns_on_top")?;
    check_reorder_list(&policy.columns_at_end, "columns_at_end")?;
    if let Some(name) = policy
        .columns_on_top
        .iter()
        .find(|name| policy.columns_at_end.contains(name))
    {
        return Err(PirogueError::ConflictingDirectives {
            column: name.clone(),
            reason: "listed in both columns_on_top and columns_at_end".to_string(),
        });
    }

    let mut top = Vec::new();
    for name in &policy.columns_on_top {
        if let Some(idx) = resolve_reordered(candidates, name, "columns_on_top")? {
            top.push(idx);
        }
    }
    let mut end = Vec::new();
    for name in &policy.columns_at_end {
        if let Some(idx) = resolve_reordered(candidates, name, "columns_at_end")? {
            end.push(idx);
        }
    }

    let key = candidates
        .iter()
        .position(|c| c.column.role == ColumnRole::ViewKey)
        .ok_or_else(|| internal_error!("view key missing from composed columns"))?;

    let mut order = Vec::with_capacity(candidates.len());
    order.push(key);
    order.extend(&top);
    order.extend(
        (0..candidates.len())
            .filter(|idx| *idx != key && !top.contains(idx) && !end.contains(idx))
            .filter(|idx| candidates[*idx].state != State::Folded),
    );
    order.extend(&end);
    Ok(order)
}

fn apply_key_defaults(candidates: &mut [Candidate], policy: &CompositionPolicy) -> PirogueResult<()> {
    for (name, expression) in &policy.pkey_default_values {
        if let Some(key) = candidates
            .iter_mut()
            .find(|c| c.column.role == ColumnRole::ViewKey && &c.column.effective_name == name)
        {
            key.column.value_expression = ValueExpression::CoalesceDefault(expression.clone());
            continue;
        }

        let exists = candidates
            .iter()
            .any(|c| c.state == State::Live && &c.column.effective_name == name);
        if exists {
            return Err(PirogueError::ConflictingDirectives {
                column: name.clone(),
                reason: "only the view key can take a default value".to_string(),
            });
        }
        return Err(PirogueError::UnknownColumn {
            column: name.clone(),
            directive: "pkey_default_values",
        });
    }
    Ok(())
}

fn insert_slot(column: &mut OutputColumn) -> &mut ValueExpression {
    &mut column.value_expression
}

fn update_slot(column: &mut OutputColumn) -> &mut ValueExpression {
    &mut column.update_expression
}

/// Step 7: replace `NEW.<column>` for columns of one table
fn apply_values(
    candidates: &mut [Candidate],
    set: &DescriptorSet,
    values: &BTreeMap<String, String>,
    directive: &'static str,
    slot: fn(&mut OutputColumn) -> &mut ValueExpression,
) -> PirogueResult<()> {
    let alias = set.table.source_alias();
    for (name, expression) in values {
        let candidate = candidates
            .iter_mut()
            .find(|c| c.column.source_table_alias == alias && c.column.name() == name)
            .ok_or_else(|| PirogueError::UnknownColumn {
                column: format!("{alias}.{name}"),
                directive,
            })?;

        if candidate.column.role != ColumnRole::Regular {
            return Err(PirogueError::ConflictingDirectives {
                column: format!("{alias}.{name}"),
                reason: format!("key columns are written with the view key and cannot take {directive}"),
            });
        }
        if candidate.state != State::Live {
            return Err(PirogueError::ConflictingDirectives {
                column: format!("{alias}.{name}"),
                reason: format!("column is skipped, so {directive} would never be written"),
            });
        }

        *slot(&mut candidate.column) = ValueExpression::Custom(expression.clone());
    }
    Ok(())
}
