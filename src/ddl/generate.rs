use crate::catalog::{resolve_all, CatalogCursor};
use crate::config::VIEW_NAME_PREFIX;
use crate::ddl::trigger::{delete_body, insert_body, trigger_statements, update_body, TriggerEvent};
use crate::ddl::view::{default_statement, view_statements};
use crate::error::{PirogueError, PirogueResult};
use crate::internal_error;
use crate::planner::plan;
use crate::schema::composer::compose;
use crate::schema::definition::{CompositionPolicy, CompositionSpec, InheritanceKind, ParentDefinition};
use crate::schema::{ColumnDescriptor, ColumnRole, ValueExpression};

/// One generation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub definition: CompositionSpec,
    /// Multiple inheritance only: also emit one single-inheritance view per
    /// parent
    pub create_joins: bool,
    /// Drop and recreate the view instead of replacing it
    pub drop: bool,
}

impl GenerationRequest {
    pub fn new(definition: CompositionSpec) -> Self {
        Self {
            definition,
            create_joins: false,
            drop: false,
        }
    }
}

/// Generate the SQL for a request, reading table metadata through `cursor`
///
/// Steps:
/// 1. Validate the definition shape
/// 2. Resolve every table's columns (one catalog query per table)
/// 3. Plan, compose and emit (see [`generate_from_descriptors`])
pub fn generate<C: CatalogCursor + ?Sized>(cursor: &mut C, request: &GenerationRequest) -> PirogueResult<String> {
    request.definition.validate()?;
    let descriptor_sets = resolve_all(cursor, &request.definition)?;
    generate_from_descriptors(&descriptor_sets, request)
}

/// Generate the SQL for a request from already fetched metadata.
///
/// `descriptor_sets` holds the child's columns, then each parent's, in
/// declaration order. Either the whole script is returned or an error;
/// nothing is emitted for a request that fails halfway.
pub fn generate_from_descriptors(
    descriptor_sets: &[Vec<ColumnDescriptor>],
    request: &GenerationRequest,
) -> PirogueResult<String> {
    let spec = &request.definition;
    spec.validate()?;

    if request.create_joins && spec.kind != InheritanceKind::Multiple {
        return Err(PirogueError::InvalidDefinition {
            reason: "create_joins applies to multiple inheritance only".to_string(),
        });
    }

    let mut statements = composition_statements(spec, descriptor_sets, request.drop)?;

    if request.create_joins {
        for (position, parent) in spec.parents.iter().enumerate() {
            let join_spec = join_definition(spec, parent);
            join_spec.validate()?;
            let join_sets = [descriptor_sets[0].clone(), descriptor_sets[position + 1].clone()];
            statements.extend(composition_statements(&join_spec, &join_sets, request.drop)?);
        }
    }

    let mut sql = statements.join("\n\n");
    sql.push('\n');
    Ok(sql)
}

/// Single-inheritance view of the child and one parent, default policy.
/// The parent's value overrides carry over; trigger hooks do not.
fn join_definition(spec: &CompositionSpec, parent: &ParentDefinition) -> CompositionSpec {
    let child = spec.child_ref();
    let parent_ref = parent.table_ref();
    CompositionSpec {
        kind: InheritanceKind::Single,
        child: spec.child.clone(),
        child_alias: spec.child_alias.clone(),
        parents: vec![ParentDefinition {
            prefix: None,
            ..parent.clone()
        }],
        view_schema: Some(spec.view_ref().schema),
        view_name: Some(format!(
            "{}_{}_{}",
            VIEW_NAME_PREFIX,
            child.name,
            parent_ref.source_alias()
        )),
        pkey_default_value: false,
        policy: CompositionPolicy::default(),
        insert_trigger: None,
        update_trigger: None,
    }
}

/// View, optional key default, and the three triggers of one composition
fn composition_statements(
    spec: &CompositionSpec,
    descriptor_sets: &[Vec<ColumnDescriptor>],
    drop: bool,
) -> PirogueResult<Vec<String>> {
    let plan = plan(spec, descriptor_sets)?;
    let columns = compose(&plan.descriptor_sets(), &spec.policy)?;
    let writes = plan.writes(&columns)?;
    let view = spec.view_ref();

    let view_key = columns
        .iter()
        .find(|column| column.role == ColumnRole::ViewKey)
        .ok_or_else(|| internal_error!("composed columns have no view key"))?;

    let mut statements = view_statements(&view, &plan, &columns, drop);

    if spec.pkey_default_value {
        let generator = writes
            .first()
            .and_then(|write| write.keys.first())
            .ok_or_else(|| internal_error!("plan has no key generator"))?;
        let expression = match (&view_key.value_expression, &generator.descriptor.default_expr) {
            (ValueExpression::CoalesceDefault(expression), _) => expression.clone(),
            (ValueExpression::NewColumn, Some(expression)) => expression.clone(),
            (ValueExpression::NewColumn, None) => {
                return Err(PirogueError::InvalidDefinition {
                    reason: format!(
                        "pkey_default_value is set but {}.{} has no default; add it to pkey_default_values",
                        generator.descriptor.table.display_name(),
                        generator.name()
                    ),
                })
            }
        };
        statements.push(default_statement(&view, view_key, &expression));
    }

    for event in TriggerEvent::ALL {
        let (body, hooks) = match event {
            TriggerEvent::Insert => (
                insert_body(&writes, &columns, spec.policy.remove_pkey),
                spec.insert_trigger.as_ref(),
            ),
            TriggerEvent::Update => (update_body(&writes, &view_key.effective_name), spec.update_trigger.as_ref()),
            TriggerEvent::Delete => (delete_body(&plan, &view_key.effective_name), None),
        };
        statements.extend(trigger_statements(&view, event, &body, hooks, drop));
    }

    Ok(statements)
}
