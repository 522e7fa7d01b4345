use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::spec::Specification;
use crate::Result;

/// Direction for sorting results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// A search box value. The widget always sends `regex`; the engine accepts
/// it and never consults it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTerm {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub regex: bool,
}

impl SearchTerm {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            regex: false,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }
}

/// One column of the table, as configured by the widget.
///
/// `data` is the attribute path resolved against the engine's root entity
/// and may be dotted (`customer.name`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableColumn {
    pub data: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub searchable: bool,
    #[serde(default = "default_true")]
    pub orderable: bool,
    #[serde(default, rename = "searchWithoutSpaces")]
    pub search_without_spaces: bool,
    #[serde(default)]
    pub search: SearchTerm,
}

impl TableColumn {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            name: String::new(),
            searchable: true,
            orderable: true,
            search_without_spaces: false,
            search: SearchTerm::default(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn searchable(mut self, searchable: bool) -> Self {
        self.searchable = searchable;
        self
    }

    pub fn orderable(mut self, orderable: bool) -> Self {
        self.orderable = orderable;
        self
    }

    /// Strips spaces from the search value before matching. Useful for
    /// columns holding identifiers users type with grouping spaces.
    pub fn search_without_spaces(mut self) -> Self {
        self.search_without_spaces = true;
        self
    }

    pub fn search(mut self, value: impl Into<String>) -> Self {
        self.search = SearchTerm::new(value);
        self
    }
}

/// One entry of the widget's order list: a column index plus a direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderInstruction {
    pub column: usize,
    pub dir: SortDirection,
}

/// Whether a page select returns whole root-entity rows or a positional
/// tuple per row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RowShape {
    #[default]
    Entity,
    Projection,
}

/// A table widget AJAX request, wire-compatible with DataTables
/// server-side processing, plus the engine extensions (`groupByColumns`,
/// row shape, carrier specification slots).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableRequest {
    /// Draw counter, echoed back so asynchronous responses can be matched
    /// to the request that caused them.
    #[serde(default = "default_draw")]
    pub draw: u32,
    /// Index of the first record of the visible page, 0-based.
    #[serde(default)]
    pub start: i64,
    /// Page size. `-1` means all rows.
    #[serde(default = "default_length")]
    pub length: i64,
    /// Global search applied across every searchable column.
    #[serde(default)]
    pub search: SearchTerm,
    #[serde(default)]
    pub order: Vec<OrderInstruction>,
    #[serde(default)]
    pub columns: Vec<TableColumn>,
    /// Columns to GROUP BY. Switches both counts to distinct-group
    /// cardinality.
    #[serde(default, rename = "groupByColumns")]
    pub group_by_columns: Option<Vec<TableColumn>>,
    /// Opaque bag forwarded by the view layer. Never read by the engine.
    #[serde(default, rename = "extraProps")]
    pub extra_props: HashMap<String, Value>,
    #[serde(skip)]
    pub shape: RowShape,
    /// Carrier slot for a caller-managed scope. The engine only consumes
    /// the specifications passed explicitly to `find_all`.
    #[serde(skip)]
    pub base_specification: Option<Specification>,
    #[serde(skip)]
    pub additional_specification: Option<Specification>,
}

fn default_true() -> bool {
    true
}

fn default_draw() -> u32 {
    1
}

fn default_length() -> i64 {
    10
}

impl Default for TableRequest {
    fn default() -> Self {
        Self {
            draw: default_draw(),
            start: 0,
            length: default_length(),
            search: SearchTerm::default(),
            order: Vec::new(),
            columns: Vec::new(),
            group_by_columns: None,
            extra_props: HashMap::new(),
            shape: RowShape::default(),
            base_specification: None,
            additional_specification: None,
        }
    }
}

impl TableRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_length(length: i64) -> Self {
        Self {
            length,
            ..Self::default()
        }
    }

    pub fn add_column(&mut self, column: TableColumn) -> &mut Self {
        self.columns.push(column);
        self
    }

    /// Adds a column and an order entry pointing at it in one step.
    pub fn add_column_ordered(&mut self, column: TableColumn, dir: SortDirection) -> &mut Self {
        let index = self.columns.len();
        self.columns.push(column);
        self.order.push(OrderInstruction { column: index, dir });
        self
    }

    /// Finds a column by its `data` attribute path, exact match.
    pub fn column(&self, data: &str) -> Option<&TableColumn> {
        self.columns.iter().find(|c| c.data == data)
    }

    /// Index of the column with the given `data`, compared
    /// case-insensitively.
    pub fn column_index(&self, data: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.data.eq_ignore_ascii_case(data))
            .ok_or_else(|| Error::UnknownColumn(data.to_string()))
    }

    pub fn columns_as_map(&self) -> HashMap<&str, &TableColumn> {
        self.columns.iter().map(|c| (c.data.as_str(), c)).collect()
    }

    /// Removes a column together with any order entry pointing at it.
    /// Order entries pointing past it are reindexed.
    pub fn remove_column(&mut self, data: &str) -> Result<TableColumn> {
        let index = self.column_index(data)?;
        let removed = self.columns.remove(index);
        self.order.retain(|o| o.column != index);
        for order in &mut self.order {
            if order.column > index {
                order.column -= 1;
            }
        }
        Ok(removed)
    }

    pub fn add_order(&mut self, data: &str, dir: SortDirection) -> Result<&mut Self> {
        let column = self.column_index(data)?;
        self.order.push(OrderInstruction { column, dir });
        Ok(self)
    }

    pub fn contains_order(&self, column_index: usize) -> bool {
        self.order.iter().any(|o| o.column == column_index)
    }

    /// The order entry targeting the given column, if one exists.
    pub fn order_for(&self, data: &str) -> Result<Option<&OrderInstruction>> {
        let index = self.column_index(data)?;
        Ok(self.order.iter().find(|o| o.column == index))
    }

    pub fn remove_order(&mut self, data: &str) -> Result<bool> {
        let index = self.column_index(data)?;
        let before = self.order.len();
        self.order.retain(|o| o.column != index);
        Ok(self.order.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_wire_protocol() {
        let request = TableRequest::new();
        assert_eq!(request.draw, 1);
        assert_eq!(request.start, 0);
        assert_eq!(request.length, 10);
        assert!(request.columns.is_empty());

        let parsed: TableRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.draw, 1);
        assert_eq!(parsed.length, 10);
    }

    #[test]
    fn deserializes_widget_payload() {
        let payload = serde_json::json!({
            "draw": 3,
            "start": 20,
            "length": 10,
            "search": { "value": "ann", "regex": false },
            "order": [ { "column": 0, "dir": "desc" } ],
            "columns": [
                { "data": "name", "name": "Name", "searchable": true,
                  "orderable": true, "search": { "value": "", "regex": false } },
                { "data": "siret", "searchWithoutSpaces": true }
            ]
        });
        let request: TableRequest = serde_json::from_value(payload).unwrap();
        assert_eq!(request.draw, 3);
        assert_eq!(request.order[0].dir, SortDirection::Desc);
        assert!(request.columns[1].search_without_spaces);
        assert!(request.columns[1].searchable);
    }

    #[test]
    fn rejects_bad_sort_direction() {
        let payload = serde_json::json!({
            "order": [ { "column": 0, "dir": "sideways" } ]
        });
        assert!(serde_json::from_value::<TableRequest>(payload).is_err());
    }

    #[test]
    fn column_index_is_case_insensitive() {
        let mut request = TableRequest::new();
        request.add_column(TableColumn::new("customer.Name"));
        assert_eq!(request.column_index("customer.name").unwrap(), 0);
        assert!(matches!(
            request.column_index("missing"),
            Err(Error::UnknownColumn(_))
        ));
    }

    #[test]
    fn remove_column_reindexes_orders() {
        let mut request = TableRequest::new();
        request.add_column(TableColumn::new("a"));
        request.add_column_ordered(TableColumn::new("b"), SortDirection::Asc);
        request.add_column_ordered(TableColumn::new("c"), SortDirection::Desc);

        request.remove_column("b").unwrap();

        // the order on "b" is gone, the order on "c" now points at index 1
        assert_eq!(request.order.len(), 1);
        assert_eq!(request.order[0].column, 1);
        assert_eq!(request.columns[1].data, "c");
    }

    #[test]
    fn order_helpers_round_trip() {
        let mut request = TableRequest::new();
        request.add_column(TableColumn::new("name"));
        request.add_order("name", SortDirection::Desc).unwrap();

        assert!(request.contains_order(0));
        assert_eq!(
            request.order_for("name").unwrap().map(|o| o.dir),
            Some(SortDirection::Desc)
        );
        assert!(request.remove_order("name").unwrap());
        assert!(!request.remove_order("name").unwrap());
    }
}
