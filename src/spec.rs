use std::fmt;
use std::sync::Arc;

use crate::query::{Predicate, QueryScope};
use crate::Result;

type LeafFn = Arc<dyn Fn(&mut QueryScope<'_>) -> Result<Predicate> + Send + Sync>;

/// A deferred predicate factory, closed under `and`/`or`.
///
/// A specification stays abstract until [`Specification::to_predicate`]
/// applies it to a query scope, where its leaves resolve attribute paths
/// and may synthesize joins. Absent operands are identities: `and(None)`
/// and `or(None)` leave the receiver unchanged, and
/// [`where_clause`]`(None)` is the always-true specification.
#[derive(Clone)]
pub enum Specification {
    Always,
    Never,
    Leaf(LeafFn),
    And(Box<Specification>, Box<Specification>),
    Or(Box<Specification>, Box<Specification>),
}

/// Entry point for composing specifications: `where_clause(a).and(b).and(c)`,
/// where any operand may be `None`.
pub fn where_clause(spec: impl Into<Option<Specification>>) -> Specification {
    spec.into().unwrap_or(Specification::Always)
}

impl Specification {
    pub fn always() -> Self {
        Self::Always
    }

    pub fn never() -> Self {
        Self::Never
    }

    pub fn leaf<F>(build: F) -> Self
    where
        F: Fn(&mut QueryScope<'_>) -> Result<Predicate> + Send + Sync + 'static,
    {
        Self::Leaf(Arc::new(build))
    }

    pub fn and(self, other: impl Into<Option<Specification>>) -> Self {
        match other.into() {
            Some(other) => Self::And(Box::new(self), Box::new(other)),
            None => self,
        }
    }

    pub fn or(self, other: impl Into<Option<Specification>>) -> Self {
        match other.into() {
            Some(other) => Self::Or(Box::new(self), Box::new(other)),
            None => self,
        }
    }

    /// Interprets the tree into a concrete predicate against the given
    /// scope. Identity operands collapse away, but both sides of a
    /// combinator are always resolved first, so their joins register with
    /// the scope either way.
    pub fn to_predicate(&self, scope: &mut QueryScope<'_>) -> Result<Predicate> {
        match self {
            Specification::Always => Ok(Predicate::True),
            Specification::Never => Ok(Predicate::False),
            Specification::Leaf(build) => build(scope),
            Specification::And(a, b) => {
                let left = a.to_predicate(scope)?;
                let right = b.to_predicate(scope)?;
                Ok(match (left, right) {
                    (Predicate::True, right) => right,
                    (left, Predicate::True) => left,
                    (left, right) => Predicate::And(vec![left, right]),
                })
            }
            Specification::Or(a, b) => {
                let left = a.to_predicate(scope)?;
                let right = b.to_predicate(scope)?;
                Ok(match (left, right) {
                    (Predicate::False, right) => right,
                    (left, Predicate::False) => left,
                    (left, right) => Predicate::Or(vec![left, right]),
                })
            }
        }
    }
}

impl fmt::Debug for Specification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Specification::Always => f.write_str("Always"),
            Specification::Never => f.write_str("Never"),
            Specification::Leaf(_) => f.write_str("Leaf"),
            Specification::And(a, b) => f.debug_tuple("And").field(a).field(b).finish(),
            Specification::Or(a, b) => f.debug_tuple("Or").field(a).field(b).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnType, EntityModel, ModelRegistry};
    use crate::query::BindValue;
    use sqlx::QueryBuilder;

    fn registry() -> ModelRegistry {
        let mut registry = ModelRegistry::new();
        registry.register(
            EntityModel::new("Person", "people")
                .column("id", ColumnType::Integer)
                .column("active", ColumnType::Boolean),
        );
        registry
    }

    fn active_leaf() -> Specification {
        Specification::leaf(|scope| {
            let expr = scope.resolve("active")?;
            Ok(Predicate::eq(expr.sql(), BindValue::Bool(true)))
        })
    }

    fn rendered(spec: &Specification) -> String {
        let registry = registry();
        let root = registry.entity("Person").unwrap();
        let mut scope = QueryScope::new(&registry, root);
        let predicate = spec.to_predicate(&mut scope).unwrap();
        let mut builder = QueryBuilder::new("");
        predicate.push_sql(&mut builder);
        builder.sql().to_string()
    }

    #[test]
    fn where_of_none_is_the_conjunction_identity() {
        assert_eq!(rendered(&where_clause(None)), "true");
        assert_eq!(rendered(&where_clause(None).and(None).and(None)), "true");
    }

    #[test]
    fn none_operands_leave_the_tree_unchanged() {
        let alone = rendered(&where_clause(active_leaf()));
        assert_eq!(rendered(&where_clause(active_leaf()).and(None)), alone);
        assert_eq!(rendered(&where_clause(None).and(active_leaf())), alone);
        assert_eq!(
            rendered(&where_clause(None).and(active_leaf()).and(None)),
            alone
        );
    }

    #[test]
    fn never_is_the_disjunction_identity() {
        let alone = rendered(&where_clause(active_leaf()));
        assert_eq!(
            rendered(&Specification::never().or(active_leaf())),
            alone
        );
        assert_eq!(rendered(&Specification::never()), "false");
    }

    #[test]
    fn both_operands_render_when_present() {
        let sql = rendered(&where_clause(active_leaf()).and(active_leaf()));
        assert_eq!(sql, "((t0.active = $1) and (t0.active = $2))");
        let sql = rendered(&where_clause(active_leaf()).or(active_leaf()));
        assert_eq!(sql, "((t0.active = $1) or (t0.active = $2))");
    }
}
