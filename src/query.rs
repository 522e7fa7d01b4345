use sqlx::{Postgres, QueryBuilder};

use crate::error::Error;
use crate::model::{AttributeKind, ColumnType, EntityModel, ModelRegistry};
use crate::request::SortDirection;
use crate::Result;

/// Separator between segments of a dotted attribute path.
pub const ATTRIBUTE_SEPARATOR: char = '.';

/// A resolved attribute path: the SQL it renders to (alias-qualified
/// column) plus its storage type.
#[derive(Clone, Debug)]
pub struct SqlExpr {
    sql: String,
    ty: ColumnType,
}

impl SqlExpr {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn ty(&self) -> ColumnType {
        self.ty
    }
}

/// A value bound into the query instead of spliced into its text.
#[derive(Clone, Debug)]
pub enum BindValue {
    Text(String),
    Int(i64),
    Bool(bool),
}

/// SQL predicate tree for table queries.
///
/// The left-hand side of a leaf is trusted SQL assembled from the model
/// registry; user-influenced values only ever travel as binds.
#[derive(Clone, Debug)]
pub enum Predicate {
    True,
    False,
    Eq { lhs: String, value: BindValue },
    Like { lhs: String, pattern: String },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(lhs: impl Into<String>, value: BindValue) -> Self {
        Self::Eq {
            lhs: lhs.into(),
            value,
        }
    }

    pub fn like(lhs: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::Like {
            lhs: lhs.into(),
            pattern: pattern.into(),
        }
    }

    pub fn and(predicates: Vec<Predicate>) -> Self {
        Self::And(predicates)
    }

    pub fn or(predicates: Vec<Predicate>) -> Self {
        Self::Or(predicates)
    }

    pub(crate) fn push_sql(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Predicate::True => {
                builder.push("true");
            }
            Predicate::False => {
                builder.push("false");
            }
            Predicate::Eq { lhs, value } => {
                builder.push("(");
                builder.push(lhs.as_str());
                builder.push(" = ");
                match value {
                    BindValue::Text(v) => builder.push_bind(v.clone()),
                    BindValue::Int(v) => builder.push_bind(*v),
                    BindValue::Bool(v) => builder.push_bind(*v),
                };
                builder.push(")");
            }
            Predicate::Like { lhs, pattern } => {
                builder.push("(");
                builder.push(lhs.as_str());
                builder.push(" like ");
                builder.push_bind(pattern.clone());
                builder.push(" escape '\\')");
            }
            Predicate::And(predicates) => {
                if predicates.is_empty() {
                    builder.push("true");
                } else {
                    builder.push("(");
                    let mut iter = predicates.iter();
                    if let Some(first) = iter.next() {
                        first.push_sql(builder);
                    }
                    for predicate in iter {
                        builder.push(" and ");
                        predicate.push_sql(builder);
                    }
                    builder.push(")");
                }
            }
            Predicate::Or(predicates) => {
                if predicates.is_empty() {
                    builder.push("false");
                } else {
                    builder.push("(");
                    let mut iter = predicates.iter();
                    if let Some(first) = iter.next() {
                        first.push_sql(builder);
                    }
                    for predicate in iter {
                        builder.push(" or ");
                        predicate.push_sql(builder);
                    }
                    builder.push(")");
                }
            }
        }
    }
}

/// An inner join synthesized while resolving a dotted path. Reuse is keyed
/// on `(parent_alias, attribute)`, never on the generated alias.
#[derive(Clone, Debug)]
pub struct JoinClause {
    parent_alias: String,
    attribute: String,
    table: String,
    alias: String,
    local_column: String,
    target_column: String,
}

impl JoinClause {
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }
}

/// The query root plus the joins hanging off it. All paths of one query
/// (filters, group by, order by) resolve through the same scope so a path
/// used in several clauses lands on a single join chain.
pub struct QueryScope<'a> {
    registry: &'a ModelRegistry,
    root: &'a EntityModel,
    joins: Vec<JoinClause>,
}

impl<'a> QueryScope<'a> {
    pub fn new(registry: &'a ModelRegistry, root: &'a EntityModel) -> Self {
        Self {
            registry,
            root,
            joins: Vec::new(),
        }
    }

    pub fn joins(&self) -> &[JoinClause] {
        &self.joins
    }

    /// Resolves a dotted attribute path rooted at the scope's entity,
    /// reusing or synthesizing inner joins for association segments.
    pub fn resolve(&mut self, path: &str) -> Result<SqlExpr> {
        if !path.contains(ATTRIBUTE_SEPARATOR) {
            return scalar(self.root, "t0", path, path);
        }
        let segments: Vec<&str> = path.split(ATTRIBUTE_SEPARATOR).collect();

        let first = self
            .root
            .attribute(segments[0])
            .ok_or_else(|| unknown(self.root, segments[0], path))?;
        if let AttributeKind::Embedded { fields } = first {
            // embedded fields live on the root row, no join; anything past
            // the second segment is ignored
            let (column, ty) = fields
                .get(segments[1])
                .ok_or_else(|| unknown(self.root, segments[1], path))?;
            return Ok(SqlExpr {
                sql: format!("t0.{column}"),
                ty: *ty,
            });
        }

        let registry = self.registry;
        let mut entity = self.root;
        let mut alias = "t0".to_string();
        for segment in &segments[..segments.len() - 1] {
            let attribute = entity
                .attribute(segment)
                .ok_or_else(|| unknown(entity, segment, path))?;
            let AttributeKind::Association {
                entity: target,
                local_column,
                target_column,
            } = attribute
            else {
                return Err(unknown(entity, segment, path));
            };
            let target_model = registry
                .entity(target)
                .ok_or_else(|| Error::UnknownEntity(target.clone()))?;

            let existing = self
                .joins
                .iter()
                .find(|j| j.parent_alias == alias && j.attribute == *segment);
            alias = match existing {
                Some(join) => join.alias.clone(),
                None => {
                    let fresh = format!("t{}", self.joins.len() + 1);
                    self.joins.push(JoinClause {
                        parent_alias: alias.clone(),
                        attribute: segment.to_string(),
                        table: target_model.table().to_string(),
                        alias: fresh.clone(),
                        local_column: local_column.clone(),
                        target_column: target_column.clone(),
                    });
                    fresh
                }
            };
            entity = target_model;
        }

        scalar(entity, &alias, segments[segments.len() - 1], path)
    }

    pub(crate) fn push_from(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" from ");
        builder.push(self.root.table());
        builder.push(" t0");
        for join in &self.joins {
            builder.push(" inner join ");
            builder.push(join.table.as_str());
            builder.push(" ");
            builder.push(join.alias.as_str());
            builder.push(" on ");
            builder.push(join.alias.as_str());
            builder.push(".");
            builder.push(join.target_column.as_str());
            builder.push(" = ");
            builder.push(join.parent_alias.as_str());
            builder.push(".");
            builder.push(join.local_column.as_str());
        }
    }
}

fn scalar(entity: &EntityModel, alias: &str, name: &str, path: &str) -> Result<SqlExpr> {
    match entity.attribute(name) {
        Some(AttributeKind::Column { column, ty }) => Ok(SqlExpr {
            sql: format!("{alias}.{column}"),
            ty: *ty,
        }),
        _ => Err(unknown(entity, name, path)),
    }
}

fn unknown(entity: &EntityModel, segment: &str, path: &str) -> Error {
    Error::UnknownAttribute {
        entity: entity.name().to_string(),
        segment: segment.to_string(),
        path: path.to_string(),
    }
}

/// The parts of a page select, resolved against a scope and ready to
/// render. Everything in here is either trusted SQL or a bind-to-be.
pub(crate) struct SelectQuery {
    pub select: String,
    pub predicate: Option<Predicate>,
    pub group_by: Vec<String>,
    pub order_by: Vec<(String, SortDirection)>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub(crate) fn build_select(
    scope: &QueryScope<'_>,
    query: SelectQuery,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("select ");
    builder.push(query.select.as_str());
    scope.push_from(&mut builder);
    if let Some(predicate) = &query.predicate {
        builder.push(" where ");
        predicate.push_sql(&mut builder);
    }
    if !query.group_by.is_empty() {
        builder.push(" group by ");
        let mut first = true;
        for expr in &query.group_by {
            if !first {
                builder.push(", ");
            }
            first = false;
            builder.push(expr.as_str());
        }
    }
    if !query.order_by.is_empty() {
        builder.push(" order by ");
        let mut first = true;
        for (expr, direction) in &query.order_by {
            if !first {
                builder.push(", ");
            }
            first = false;
            builder.push(expr.as_str());
            builder.push(" ");
            builder.push(direction.as_str());
        }
    }
    if let Some(limit) = query.limit {
        builder.push(" limit ");
        builder.push_bind(limit);
    }
    if let Some(offset) = query.offset {
        builder.push(" offset ");
        builder.push_bind(offset);
    }
    builder
}

/// Renders a count query. Without group-by this is a plain `count(*)`;
/// with group-by the grouped rows are collapsed inside a subquery so the
/// result is the number of distinct groups, as a single scalar.
pub(crate) fn build_count(
    scope: &QueryScope<'_>,
    predicate: Option<&Predicate>,
    group_by: &[String],
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("select count(*)");
    if group_by.is_empty() {
        scope.push_from(&mut builder);
        if let Some(predicate) = predicate {
            builder.push(" where ");
            predicate.push_sql(&mut builder);
        }
    } else {
        builder.push(" from (select 1");
        scope.push_from(&mut builder);
        if let Some(predicate) = predicate {
            builder.push(" where ");
            predicate.push_sql(&mut builder);
        }
        builder.push(" group by ");
        let mut first = true;
        for expr in group_by {
            if !first {
                builder.push(", ");
            }
            first = false;
            builder.push(expr.as_str());
        }
        builder.push(") as grouped");
    }
    builder
}
