//! The two predicate builders of the engine: the per-request table filter
//! and the explicit OR filter over a caller-chosen column set.

use crate::error::Error;
use crate::model::ColumnType;
use crate::query::{BindValue, Predicate};
use crate::request::{SearchTerm, TableColumn, TableRequest};
use crate::spec::Specification;

/// Lower-cases a raw filter value, escapes the `like` wildcards `%` and
/// `_` with a leading `\`, and wraps it in `%…%` so it matches as a
/// literal substring.
pub fn like_pattern(value: &str) -> String {
    let escaped = value
        .to_lowercase()
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn is_boolean_literal(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false")
}

fn lowered_cast(expr: &str) -> String {
    format!("lower(cast({expr} as text))")
}

/// The specification a request implies: a conjunction of every per-column
/// filter, and-ed with a disjunction of the global search over all
/// searchable columns.
///
/// The `regex` flag on both search objects is accepted and never
/// consulted.
pub fn table_filter(request: &TableRequest) -> Specification {
    let columns: Vec<TableColumn> = request.columns.clone();
    let global = request.search.value.clone();
    Specification::leaf(move |scope| {
        let mut all = Vec::new();

        for column in &columns {
            if !column.searchable || column.search.is_blank() {
                continue;
            }
            let value = &column.search.value;
            let expr = scope.resolve(&column.data)?;
            if is_boolean_literal(value) {
                all.push(Predicate::eq(
                    expr.sql(),
                    BindValue::Bool(value.eq_ignore_ascii_case("true")),
                ));
            } else {
                all.push(Predicate::like(lowered_cast(expr.sql()), like_pattern(value)));
            }
        }

        if !global.trim().is_empty() {
            tracing::debug!(target: "gridflow::filter", value = %global, "global search");
            let mut any = Vec::new();
            for column in &columns {
                if !column.searchable {
                    continue;
                }
                let expr = scope.resolve(&column.data)?;
                any.push(Predicate::like(
                    lowered_cast(expr.sql()),
                    like_pattern(&global),
                ));
            }
            all.push(Predicate::Or(any));
        }

        Ok(Predicate::And(all))
    })
}

/// A disjunction of per-column matches on a single search value.
///
/// Text columns compare lower-cased; text columns flagged
/// `searchWithoutSpaces` additionally strip spaces from the value;
/// integer columns compare their text cast without lower-casing. Any
/// other column type is rejected.
pub fn or_filter(columns: &[TableColumn], search: &SearchTerm) -> Specification {
    let columns: Vec<TableColumn> = columns.to_vec();
    let value = search.value.trim().to_lowercase();
    Specification::leaf(move |scope| {
        let mut any = Vec::new();
        for column in &columns {
            let expr = scope.resolve(&column.data)?;
            match expr.ty() {
                ColumnType::Text => {
                    let value = if column.search_without_spaces {
                        value.replace(' ', "")
                    } else {
                        value.clone()
                    };
                    any.push(Predicate::like(
                        format!("lower({})", expr.sql()),
                        like_pattern(&value),
                    ));
                }
                ColumnType::Integer => {
                    any.push(Predicate::like(
                        format!("cast({} as text)", expr.sql()),
                        like_pattern(&value),
                    ));
                }
                ty => {
                    return Err(Error::UnsupportedColumnType {
                        column: column.data.clone(),
                        ty,
                    })
                }
            }
        }
        Ok(Predicate::Or(any))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnType, EntityModel, ModelRegistry};
    use crate::query::QueryScope;
    use sqlx::QueryBuilder;

    fn registry() -> ModelRegistry {
        let mut registry = ModelRegistry::new();
        registry.register(
            EntityModel::new("Account", "accounts")
                .column("id", ColumnType::Integer)
                .column_as("name", "full_name", ColumnType::Text)
                .column("siret", ColumnType::Text)
                .column("active", ColumnType::Boolean),
        );
        registry
    }

    fn resolve(spec: &Specification) -> Predicate {
        let registry = registry();
        let root = registry.entity("Account").unwrap();
        let mut scope = QueryScope::new(&registry, root);
        spec.to_predicate(&mut scope).unwrap()
    }

    fn rendered(spec: &Specification) -> String {
        let predicate = resolve(spec);
        let mut builder = QueryBuilder::new("");
        predicate.push_sql(&mut builder);
        builder.sql().to_string()
    }

    #[test]
    fn escapes_wildcards_and_lowercases() {
        assert_eq!(like_pattern("10%"), "%10\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern("AnN"), "%ann%");
        assert_eq!(like_pattern(""), "%%");
    }

    #[test]
    fn blank_searches_are_a_no_op() {
        let mut request = TableRequest::new();
        request.add_column(TableColumn::new("name"));
        request.add_column(TableColumn::new("active").search("   "));
        assert_eq!(rendered(&table_filter(&request)), "true");
    }

    #[test]
    fn boolean_literal_becomes_equality_not_like() {
        let mut request = TableRequest::new();
        request.add_column(TableColumn::new("active").search("TRUE"));

        let predicate = resolve(&table_filter(&request));
        let Predicate::And(items) = predicate else {
            panic!("expected a conjunction");
        };
        assert!(matches!(
            items[0],
            Predicate::Eq {
                ref lhs,
                value: BindValue::Bool(true),
            } if lhs == "t0.active"
        ));
    }

    #[test]
    fn per_column_filter_lowercases_the_cast() {
        let mut request = TableRequest::new();
        request.add_column(TableColumn::new("name").search("An_n"));

        let predicate = resolve(&table_filter(&request));
        let Predicate::And(items) = predicate else {
            panic!("expected a conjunction");
        };
        assert!(matches!(
            items[0],
            Predicate::Like { ref lhs, ref pattern }
                if lhs == "lower(cast(t0.full_name as text))" && pattern == "%an\\_n%"
        ));
    }

    #[test]
    fn global_search_spans_only_searchable_columns() {
        let mut request = TableRequest::new();
        request.search = SearchTerm::new("a");
        request.add_column(TableColumn::new("name"));
        request.add_column(TableColumn::new("siret").searchable(false));
        request.add_column(TableColumn::new("active"));

        let sql = rendered(&table_filter(&request));
        assert!(sql.contains("lower(cast(t0.full_name as text)) like"));
        assert!(sql.contains("lower(cast(t0.active as text)) like"));
        assert!(!sql.contains("t0.siret"));
    }

    #[test]
    fn non_searchable_column_filter_is_ignored() {
        let mut request = TableRequest::new();
        request.add_column(TableColumn::new("name").searchable(false).search("ann"));
        assert_eq!(rendered(&table_filter(&request)), "true");
    }

    #[test]
    fn or_filter_strips_spaces_when_flagged() {
        let columns = [TableColumn::new("siret").search_without_spaces()];
        let predicate = resolve(&or_filter(&columns, &SearchTerm::new(" 123 456 ")));
        let Predicate::Or(items) = predicate else {
            panic!("expected a disjunction");
        };
        assert!(matches!(
            items[0],
            Predicate::Like { ref lhs, ref pattern }
                if lhs == "lower(t0.siret)" && pattern == "%123456%"
        ));
    }

    #[test]
    fn or_filter_casts_integers_without_lowercasing() {
        let columns = [TableColumn::new("id")];
        let predicate = resolve(&or_filter(&columns, &SearchTerm::new("42")));
        let Predicate::Or(items) = predicate else {
            panic!("expected a disjunction");
        };
        assert!(matches!(
            items[0],
            Predicate::Like { ref lhs, .. } if lhs == "cast(t0.id as text)"
        ));
    }

    #[test]
    fn or_filter_rejects_boolean_columns() {
        let registry = registry();
        let root = registry.entity("Account").unwrap();
        let mut scope = QueryScope::new(&registry, root);

        let columns = [TableColumn::new("active")];
        let err = or_filter(&columns, &SearchTerm::new("x"))
            .to_predicate(&mut scope)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedColumnType { ty: ColumnType::Boolean, .. }
        ));
    }

    #[test]
    fn or_filter_is_commutative_over_column_order() {
        let forward = [TableColumn::new("name"), TableColumn::new("id")];
        let backward = [TableColumn::new("id"), TableColumn::new("name")];
        let search = SearchTerm::new("7");

        let collect = |spec: &Specification| -> Vec<String> {
            let Predicate::Or(items) = resolve(spec) else {
                panic!("expected a disjunction");
            };
            let mut sides: Vec<String> = items
                .iter()
                .map(|p| match p {
                    Predicate::Like { lhs, pattern } => format!("{lhs} {pattern}"),
                    other => panic!("unexpected predicate {other:?}"),
                })
                .collect();
            sides.sort();
            sides
        };

        assert_eq!(
            collect(&or_filter(&forward, &search)),
            collect(&or_filter(&backward, &search))
        );
    }
}
