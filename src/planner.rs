//! Join and write planning
//!
//! Every table of a composition becomes a [`Level`] in a flat arena. The
//! plan records how levels join (one equality per edge, always inner
//! joins), which column of each level carries the shared key, and in which
//! order the trigger functions touch the tables:
//!
//! - single inheritance: INSERT root first down to the child, DELETE child
//!   first up to the root
//! - multiple inheritance: INSERT parents in declared order then the child,
//!   DELETE the child then the parents in reverse order
//!
//! A child joins a parent through, in order of preference: the declared
//! `fkey`, a single-column foreign key found in the catalog that references
//! the parent's key, or a key column of the same name. Anything else is a
//! disconnected join.
//!
//! The first table in INSERT order generates the key; every later INSERT
//! reuses `NEW.<view key>`. Unless `pkey_default_values` says otherwise the
//! generator falls back to its own column default when `NEW.<view key>` is
//! NULL.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{PirogueError, PirogueResult};
use crate::internal_error;
use crate::schema::composer::{DescriptorSet, TableRole};
use crate::schema::definition::{CompositionSpec, InheritanceKind};
use crate::schema::{ColumnDescriptor, ColumnRole, OutputColumn, TableRef, ValueExpression};

/// One table of the composition
#[derive(Debug, Clone)]
pub struct Level {
    pub table: TableRef,
    pub columns: Vec<ColumnDescriptor>,
    pub role: TableRole,
    /// Column holding the shared key (the view key for the child, the
    /// primary key for parents)
    pub key_column: String,
    /// Column referencing the next ancestor when it differs from `key_column`
    pub link_column: Option<String>,
    /// Level whose key references this one
    pub joined_from: Option<usize>,
    pub prefix: Option<String>,
    pub insert_values: BTreeMap<String, String>,
    pub update_values: BTreeMap<String, String>,
}

impl Level {
    pub fn alias(&self) -> &str {
        self.table.source_alias()
    }

    fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Columns written with the shared key on INSERT
    pub fn key_columns(&self) -> Vec<String> {
        let mut keys = vec![self.key_column.clone()];
        if let Some(link) = &self.link_column {
            keys.push(link.clone());
        }
        keys
    }

    /// Column this level uses to reach the next level up
    fn upward_column(&self) -> &str {
        self.link_column.as_deref().unwrap_or(&self.key_column)
    }
}

/// `left.<left_column> = right.<right_column>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinEdge {
    pub left: usize,
    pub right: usize,
    pub predicate_columns: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct CompositionPlan {
    pub kind: InheritanceKind,
    /// Index 0 is the child, then parents in declaration order
    pub levels: Vec<Level>,
    pub joins: Vec<JoinEdge>,
    pub insert_order: Vec<usize>,
    pub delete_order: Vec<usize>,
}

/// Writes a trigger function performs on one table
#[derive(Debug, Clone)]
pub struct TableWrite {
    pub table: TableRef,
    /// Key column of the table, used in UPDATE/DELETE predicates
    pub key_column: String,
    /// Shared-key columns of this table, already carrying the view key name
    pub keys: Vec<OutputColumn>,
    /// Regular live columns owned by this table
    pub columns: Vec<OutputColumn>,
    /// Set on the key generator: `RETURNING <column> INTO NEW.<view key>`
    pub returning: Option<String>,
}

/// Find the single primary-key column of a table
fn primary_key<'a>(table: &TableRef, columns: &'a [ColumnDescriptor]) -> PirogueResult<Option<&'a ColumnDescriptor>> {
    let keys: Vec<&ColumnDescriptor> = columns.iter().filter(|column| column.is_primary_key).collect();
    match keys.as_slice() {
        [] => Ok(None),
        [key] => Ok(Some(*key)),
        _ => Err(PirogueError::CompositePrimaryKey {
            table: table.display_name(),
            columns: keys.iter().map(|key| key.name.clone()).collect(),
        }),
    }
}

fn require_column(level_table: &TableRef, columns: &[ColumnDescriptor], name: &str) -> PirogueResult<()> {
    if columns.iter().any(|column| column.name == name) {
        Ok(())
    } else {
        Err(PirogueError::UnknownColumn {
            column: format!("{}.{}", level_table.source_alias(), name),
            directive: "fkey",
        })
    }
}

/// Column of `columns` holding a foreign key to `target.target_key`
fn discovered_fkey<'a>(columns: &'a [ColumnDescriptor], target: &TableRef, target_key: &str) -> Option<&'a str> {
    columns
        .iter()
        .find(|column| column.references.iter().any(|r| r.points_to(target, target_key)))
        .map(|column| column.name.as_str())
}

/// Column of `from` linking it to `to`: the declared `fkey`, else a
/// foreign key from the catalog
fn linking_column<'a>(
    declared: Option<&'a str>,
    from: &TableRef,
    from_columns: &'a [ColumnDescriptor],
    to: &TableRef,
    to_key: &str,
) -> PirogueResult<Option<&'a str>> {
    match declared {
        Some(fkey) => {
            require_column(from, from_columns, fkey)?;
            Ok(Some(fkey))
        }
        None => Ok(discovered_fkey(from_columns, to, to_key)),
    }
}

fn unlinked(from: &TableRef, from_key: &str, to: &TableRef, to_key: &str) -> PirogueError {
    PirogueError::DisconnectedJoin {
        table: to.display_name(),
        reason: format!(
            "no foreign key from {} references it and its key '{}' differs from '{}'; set fkey",
            from.display_name(),
            to_key,
            from_key
        ),
    }
}

/// Key column of the child: the column linking it to its direct parents,
/// else its primary key
fn child_key(
    spec: &CompositionSpec,
    tables: &[TableRef],
    descriptor_sets: &[Vec<ColumnDescriptor>],
    parent_keys: &[String],
) -> PirogueResult<String> {
    let child = &tables[0];
    let child_columns = &descriptor_sets[0];
    let direct = match spec.kind {
        InheritanceKind::Single => 1,
        InheritanceKind::Multiple => spec.parents.len(),
    };

    let mut linked = BTreeSet::new();
    let mut unlinked_parents = Vec::new();
    for position in 0..direct {
        let link = linking_column(
            spec.parents[position].fkey.as_deref(),
            child,
            child_columns,
            &tables[position + 1],
            &parent_keys[position],
        )?;
        match link {
            Some(column) => {
                linked.insert(column);
            }
            None => unlinked_parents.push(position),
        }
    }

    if linked.len() > 1 {
        return Err(PirogueError::ConflictingDirectives {
            column: linked.into_iter().collect::<Vec<_>>().join(", "),
            reason: "parents of a multiple inheritance must share one child key column".to_string(),
        });
    }

    let key = match linked.into_iter().next() {
        Some(column) => column.to_string(),
        None => match primary_key(child, child_columns)? {
            Some(key) => key.name.clone(),
            None => {
                return Err(PirogueError::DisconnectedJoin {
                    table: child.display_name(),
                    reason: "child table has no primary key and no foreign key to its parent; set fkey".to_string(),
                })
            }
        },
    };

    for position in unlinked_parents {
        if parent_keys[position] != key {
            return Err(unlinked(child, &key, &tables[position + 1], &parent_keys[position]));
        }
    }
    Ok(key)
}

/// Build the plan from a definition and one descriptor set per table
/// (child first, then parents in declaration order).
pub fn plan(spec: &CompositionSpec, descriptor_sets: &[Vec<ColumnDescriptor>]) -> PirogueResult<CompositionPlan> {
    let tables = spec.table_refs();
    if descriptor_sets.len() != tables.len() {
        return Err(internal_error!(
            "expected {} descriptor sets, got {}",
            tables.len(),
            descriptor_sets.len()
        ));
    }

    let mut aliases = BTreeSet::new();
    for table in &tables {
        if !aliases.insert(table.source_alias()) {
            return Err(PirogueError::InvalidDefinition {
                reason: format!(
                    "table alias '{}' is used twice; give one of the tables an alias",
                    table.source_alias()
                ),
            });
        }
    }

    // Relation kind comes from the catalog
    let tables: Vec<TableRef> = tables
        .into_iter()
        .zip(descriptor_sets)
        .map(|(table, columns)| match columns.first() {
            Some(column) => table.with_kind(column.table.kind),
            None => table,
        })
        .collect();

    let parent_keys = (1..tables.len())
        .map(|idx| match primary_key(&tables[idx], &descriptor_sets[idx])? {
            Some(key) => Ok(key.name.clone()),
            None => Err(PirogueError::DisconnectedJoin {
                table: tables[idx].display_name(),
                reason: "parent table has no primary key".to_string(),
            }),
        })
        .collect::<PirogueResult<Vec<_>>>()?;

    let mut levels = Vec::with_capacity(tables.len());
    levels.push(Level {
        key_column: child_key(spec, &tables, descriptor_sets, &parent_keys)?,
        table: tables[0].clone(),
        columns: descriptor_sets[0].clone(),
        role: TableRole::Child,
        link_column: None,
        joined_from: None,
        prefix: None,
        insert_values: BTreeMap::new(),
        update_values: BTreeMap::new(),
    });

    for (position, parent) in spec.parents.iter().enumerate() {
        let idx = position + 1;
        let table = &tables[idx];
        let columns = &descriptor_sets[idx];
        let key = &parent_keys[position];

        let (link_column, joined_from) = match spec.kind {
            InheritanceKind::Single => {
                let link = match spec.parents.get(position + 1) {
                    Some(next) => {
                        let next_table = &tables[idx + 1];
                        let next_key = &parent_keys[position + 1];
                        match linking_column(next.fkey.as_deref(), table, columns, next_table, next_key)? {
                            Some(column) if column != key.as_str() => Some(column.to_string()),
                            Some(_) => None,
                            None if next_key == key => None,
                            None => return Err(unlinked(table, key, next_table, next_key)),
                        }
                    }
                    None => None,
                };
                (link, position)
            }
            InheritanceKind::Multiple => (None, 0),
        };

        levels.push(Level {
            table: table.clone(),
            columns: columns.clone(),
            role: TableRole::Parent,
            key_column: key.clone(),
            link_column,
            joined_from: Some(joined_from),
            prefix: parent.prefix.clone(),
            insert_values: parent.insert_values.clone(),
            update_values: parent.update_values.clone(),
        });
    }

    let joins = levels
        .iter()
        .enumerate()
        .filter_map(|(idx, level)| level.joined_from.map(|from| (from, idx)))
        .map(|(from, to)| JoinEdge {
            left: from,
            right: to,
            predicate_columns: vec![(
                levels[from].upward_column().to_string(),
                levels[to].key_column.clone(),
            )],
        })
        .collect::<Vec<_>>();

    for edge in &joins {
        check_key_types(&levels[edge.left], &levels[edge.right], &edge.predicate_columns)?;
    }
    for level in &levels {
        if let Some(link) = &level.link_column {
            check_key_types(level, level, &[(link.clone(), level.key_column.clone())])?;
        }
    }

    let last = levels.len() - 1;
    let (insert_order, delete_order) = match spec.kind {
        InheritanceKind::Single => ((0..=last).rev().collect(), (0..=last).collect()),
        InheritanceKind::Multiple => {
            let mut insert: Vec<usize> = (1..=last).collect();
            insert.push(0);
            let mut delete = vec![0];
            delete.extend((1..=last).rev());
            (insert, delete)
        }
    };

    Ok(CompositionPlan {
        kind: spec.kind,
        levels,
        joins,
        insert_order,
        delete_order,
    })
}

fn check_key_types(left: &Level, right: &Level, predicate: &[(String, String)]) -> PirogueResult<()> {
    for (left_name, right_name) in predicate {
        let left_column = left.column(left_name).ok_or_else(|| PirogueError::UnknownColumn {
            column: format!("{}.{}", left.alias(), left_name),
            directive: "join",
        })?;
        let right_column = right.column(right_name).ok_or_else(|| PirogueError::UnknownColumn {
            column: format!("{}.{}", right.alias(), right_name),
            directive: "join",
        })?;
        if left_column.sql_type != right_column.sql_type {
            return Err(PirogueError::KeyTypeMismatch {
                column: format!("{}.{} = {}.{}", left.alias(), left_name, right.alias(), right_name),
                left: left_column.sql_type.clone(),
                right: right_column.sql_type.clone(),
            });
        }
    }
    Ok(())
}

impl CompositionPlan {
    pub fn child(&self) -> &Level {
        &self.levels[0]
    }

    /// Key-generating level
    pub fn generator(&self) -> usize {
        self.insert_order[0]
    }

    /// Descriptor sets in composition order: the child first for single
    /// inheritance, the parents then the child for multiple inheritance
    pub fn descriptor_sets(&self) -> Vec<DescriptorSet> {
        let order: Vec<usize> = match self.kind {
            InheritanceKind::Single => (0..self.levels.len()).collect(),
            InheritanceKind::Multiple => (1..self.levels.len()).chain(std::iter::once(0)).collect(),
        };
        order
            .into_iter()
            .map(|idx| {
                let level = &self.levels[idx];
                DescriptorSet {
                    table: level.table.clone(),
                    columns: level.columns.clone(),
                    key_columns: level.key_columns(),
                    role: level.role,
                    prefix: level.prefix.clone(),
                    insert_values: level.insert_values.clone(),
                    update_values: level.update_values.clone(),
                }
            })
            .collect()
    }

    /// Distribute composed columns to their tables, in INSERT order
    pub fn writes(&self, columns: &[OutputColumn]) -> PirogueResult<Vec<TableWrite>> {
        let view_key = columns
            .iter()
            .find(|column| column.role == ColumnRole::ViewKey)
            .ok_or_else(|| internal_error!("composed columns have no view key"))?;
        let generator = self.generator();

        self.insert_order
            .iter()
            .map(|&idx| -> PirogueResult<TableWrite> {
                let level = &self.levels[idx];
                let keys = level
                    .key_columns()
                    .iter()
                    .map(|name| {
                        let descriptor = level.column(name).ok_or_else(|| {
                            internal_error!("key column {} missing from {}", name, level.table.display_name())
                        })?;
                        let mut key = OutputColumn::new(descriptor.clone(), level.alias());
                        key.effective_name = view_key.effective_name.clone();
                        key.role = ColumnRole::ViewKey;
                        key.value_expression = match (&view_key.value_expression, &descriptor.default_expr) {
                            _ if idx != generator => ValueExpression::NewColumn,
                            (ValueExpression::NewColumn, Some(default)) => {
                                ValueExpression::CoalesceDefault(default.clone())
                            }
                            (expression, _) => expression.clone(),
                        };
                        Ok(key)
                    })
                    .collect::<PirogueResult<Vec<_>>>()?;

                let owned = columns
                    .iter()
                    .filter(|column| column.source_table_alias == level.alias())
                    .filter(|column| column.role == ColumnRole::Regular && column.is_live())
                    .cloned()
                    .collect();

                Ok(TableWrite {
                    table: level.table.clone(),
                    key_column: level.key_column.clone(),
                    keys,
                    columns: owned,
                    returning: (idx == generator).then(|| level.key_column.clone()),
                })
            })
            .collect()
    }

    /// Writes in DELETE order
    pub fn delete_tables(&self) -> Vec<(&TableRef, &str)> {
        self.delete_order
            .iter()
            .map(|&idx| (&self.levels[idx].table, self.levels[idx].key_column.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::definition::ParentDefinition;

    fn table(schema_table: &str, columns: &[(&str, &str, bool)]) -> Vec<ColumnDescriptor> {
        let table = TableRef::parse(schema_table);
        columns
            .iter()
            .map(|(name, sql_type, pk)| {
                let column = ColumnDescriptor::new(&table, name, sql_type);
                if *pk {
                    column.primary_key()
                } else {
                    column
                }
            })
            .collect()
    }

    fn chain_spec() -> (CompositionSpec, Vec<Vec<ColumnDescriptor>>) {
        let mut spec = CompositionSpec::single("zoo.feline", "zoo.cat");
        spec.parents.push(ParentDefinition::new("zoo.animal"));
        let sets = vec![
            table("zoo.cat", &[("id", "integer", true), ("eye_color", "text", false)]),
            table("zoo.feline", &[("id", "integer", true), ("claws", "boolean", false)]),
            table("zoo.animal", &[("id", "integer", true), ("name", "text", false)]),
        ];
        (spec, sets)
    }

    #[test]
    fn test_single_chain_orders() {
        let (spec, sets) = chain_spec();
        let plan = plan(&spec, &sets).unwrap();

        assert_eq!(plan.insert_order, vec![2, 1, 0]);
        assert_eq!(plan.delete_order, vec![0, 1, 2]);
        assert_eq!(plan.generator(), 2);
        assert_eq!(
            plan.joins,
            vec![
                JoinEdge { left: 0, right: 1, predicate_columns: vec![("id".into(), "id".into())] },
                JoinEdge { left: 1, right: 2, predicate_columns: vec![("id".into(), "id".into())] },
            ]
        );
        assert_eq!(plan.levels[2].joined_from, Some(1));
    }

    #[test]
    fn test_multiple_orders() {
        let mut spec = CompositionSpec::single("a", "child");
        spec.kind = InheritanceKind::Multiple;
        spec.parents.push(ParentDefinition::new("b"));
        spec.parents.push(ParentDefinition::new("c"));
        let sets = vec![
            table("child", &[("id", "integer", true)]),
            table("a", &[("id", "integer", true)]),
            table("b", &[("id", "integer", true)]),
            table("c", &[("id", "integer", true)]),
        ];
        let plan = plan(&spec, &sets).unwrap();

        assert_eq!(plan.insert_order, vec![1, 2, 3, 0]);
        assert_eq!(plan.delete_order, vec![0, 3, 2, 1]);
        assert!(plan.joins.iter().all(|edge| edge.left == 0));

        let sets = plan.descriptor_sets();
        assert_eq!(sets.last().map(|set| set.role), Some(TableRole::Child));
    }

    #[test]
    fn test_parent_without_key() {
        let spec = CompositionSpec::single("animal", "cat");
        let sets = vec![
            table("cat", &[("id", "integer", true)]),
            table("animal", &[("id", "integer", false)]),
        ];
        assert!(matches!(plan(&spec, &sets), Err(PirogueError::DisconnectedJoin { .. })));
    }

    #[test]
    fn test_composite_key_unsupported() {
        let spec = CompositionSpec::single("animal", "cat");
        let sets = vec![
            table("cat", &[("id", "integer", true)]),
            table("animal", &[("id", "integer", true), ("kind", "text", true)]),
        ];
        match plan(&spec, &sets) {
            Err(PirogueError::CompositePrimaryKey { columns, .. }) => assert_eq!(columns, vec!["id", "kind"]),
            other => panic!("expected composite key error, got {other:?}"),
        }
    }

    #[test]
    fn test_key_type_mismatch() {
        let spec = CompositionSpec::single("animal", "cat");
        let sets = vec![
            table("cat", &[("id", "integer", true)]),
            table("animal", &[("id", "uuid", true)]),
        ];
        assert!(matches!(plan(&spec, &sets), Err(PirogueError::KeyTypeMismatch { .. })));
    }

    #[test]
    fn test_child_fkey() {
        let mut spec = CompositionSpec::single("animal", "cat");
        spec.parents[0].fkey = Some("animal_id".to_string());
        let sets = vec![
            table("cat", &[("id", "integer", true), ("animal_id", "integer", false)]),
            table("animal", &[("id", "integer", true)]),
        ];
        let plan = plan(&spec, &sets).unwrap();
        assert_eq!(plan.child().key_column, "animal_id");
        assert_eq!(plan.joins[0].predicate_columns, vec![("animal_id".into(), "id".into())]);

        spec.parents[0].fkey = Some("ghost".to_string());
        assert!(matches!(
            super::plan(&spec, &sets),
            Err(PirogueError::UnknownColumn { directive: "fkey", .. })
        ));
    }

    #[test]
    fn test_duplicate_alias() {
        let spec = CompositionSpec::single("other.cat", "cat");
        let sets = vec![
            table("cat", &[("id", "integer", true)]),
            table("other.cat", &[("id", "integer", true)]),
        ];
        assert!(matches!(plan(&spec, &sets), Err(PirogueError::InvalidDefinition { .. })));
    }

    #[test]
    fn test_writes_reuse_generated_key() {
        let (spec, sets) = chain_spec();
        let plan = plan(&spec, &sets).unwrap();
        let mut columns = crate::schema::composer::compose(&plan.descriptor_sets(), &spec.policy).unwrap();
        columns[0].value_expression = ValueExpression::CoalesceDefault("nextval('s')".to_string());

        let writes = plan.writes(&columns).unwrap();
        assert_eq!(writes.len(), 3);
        assert_eq!(writes[0].table.name, "animal");
        assert_eq!(writes[0].returning.as_deref(), Some("id"));
        assert_eq!(writes[0].keys[0].insert_value(), "COALESCE(NEW.id, nextval('s'))");
        assert_eq!(writes[1].keys[0].insert_value(), "NEW.id");
        assert_eq!(writes[1].returning, None);
        assert_eq!(writes[2].columns.iter().map(|c| c.name()).collect::<Vec<_>>(), vec!["eye_color"]);
    }

    #[test]
    fn test_foreign_key_discovered() {
        let spec = CompositionSpec::single("zoo.animal", "zoo.cat");
        let animal = TableRef::new("zoo", "animal");
        let cat = TableRef::new("zoo", "cat");
        let sets = vec![
            vec![
                ColumnDescriptor::new(&cat, "id", "integer").primary_key(),
                ColumnDescriptor::new(&cat, "animal_id", "integer").references(&animal, "aid"),
            ],
            vec![ColumnDescriptor::new(&animal, "aid", "integer").primary_key()],
        ];
        let plan = plan(&spec, &sets).unwrap();
        assert_eq!(plan.child().key_column, "animal_id");
        assert_eq!(plan.joins[0].predicate_columns, vec![("animal_id".into(), "aid".into())]);
    }

    #[test]
    fn test_unrelated_keys_disconnected() {
        let spec = CompositionSpec::single("zoo.animal", "zoo.cat");
        let sets = vec![
            table("zoo.cat", &[("id", "integer", true), ("animal_id", "integer", false)]),
            table("zoo.animal", &[("aid", "integer", true)]),
        ];
        match plan(&spec, &sets) {
            Err(PirogueError::DisconnectedJoin { table, .. }) => assert_eq!(table, "zoo.animal"),
            other => panic!("expected disconnected join, got {other:?}"),
        }

        // a foreign key to some other table does not link them
        let mut sets = sets;
        sets[0][1] = sets[0][1].clone().references(&TableRef::new("zoo", "owner"), "aid");
        assert!(matches!(plan(&spec, &sets), Err(PirogueError::DisconnectedJoin { .. })));
    }

    fn linked_chain(declare_fkey: bool) -> (CompositionSpec, Vec<Vec<ColumnDescriptor>>) {
        let mut spec = CompositionSpec::single("zoo.feline", "zoo.cat");
        let mut animal = ParentDefinition::new("zoo.animal");
        if declare_fkey {
            animal.fkey = Some("animal_ref".to_string());
        }
        spec.parents.push(animal);

        let animal = TableRef::new("zoo", "animal");
        let feline = TableRef::new("zoo", "feline");
        let mut animal_ref = ColumnDescriptor::new(&feline, "animal_ref", "integer");
        if !declare_fkey {
            animal_ref = animal_ref.references(&animal, "aid");
        }
        let sets = vec![
            table("zoo.cat", &[("id", "integer", true), ("eye_color", "text", false)]),
            vec![
                ColumnDescriptor::new(&feline, "id", "integer").primary_key(),
                animal_ref,
                ColumnDescriptor::new(&feline, "claws", "boolean"),
            ],
            vec![
                ColumnDescriptor::new(&animal, "aid", "integer").primary_key(),
                ColumnDescriptor::new(&animal, "name", "text"),
            ],
        ];
        (spec, sets)
    }

    #[test]
    fn test_chain_link_column() {
        for declare_fkey in [true, false] {
            let (spec, sets) = linked_chain(declare_fkey);
            let plan = plan(&spec, &sets).unwrap();

            assert_eq!(plan.levels[1].link_column.as_deref(), Some("animal_ref"));
            assert_eq!(
                plan.joins[1],
                JoinEdge { left: 1, right: 2, predicate_columns: vec![("animal_ref".into(), "aid".into())] }
            );

            let columns = crate::schema::composer::compose(&plan.descriptor_sets(), &spec.policy).unwrap();
            let writes = plan.writes(&columns).unwrap();
            assert_eq!(writes[0].table.name, "animal");
            assert_eq!(writes[0].returning.as_deref(), Some("aid"));
            assert_eq!(writes[0].keys[0].effective_name, "id");

            let feline = &writes[1];
            let keys: Vec<(&str, String)> = feline.keys.iter().map(|k| (k.name(), k.insert_value())).collect();
            assert_eq!(
                keys,
                vec![("id", "NEW.id".to_string()), ("animal_ref", "NEW.id".to_string())]
            );
            assert_eq!(feline.columns.iter().map(|c| c.name()).collect::<Vec<_>>(), vec!["claws"]);
        }
    }

    #[test]
    fn test_chain_link_type_checked() {
        let (spec, mut sets) = linked_chain(true);
        sets[1][1].sql_type = "bigint".to_string();
        assert!(matches!(plan(&spec, &sets), Err(PirogueError::KeyTypeMismatch { .. })));

        let (mut spec, sets) = linked_chain(true);
        spec.parents[1].fkey = None;
        assert!(matches!(plan(&spec, &sets), Err(PirogueError::DisconnectedJoin { .. })));
    }
}
