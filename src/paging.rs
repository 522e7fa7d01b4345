use crate::error::Error;
use crate::request::{SortDirection, TableRequest};
use crate::Result;

/// Immutable paging window derived from a request: offset, page size, and
/// the surviving sort keys.
///
/// The descriptor is a window over one result set, not a cursor.
/// Navigational operations exist for interface parity with generic
/// pageables and fail unconditionally.
#[derive(Clone, Debug)]
pub struct Page {
    offset: i64,
    page_size: i64,
    sort: Option<Vec<(SortDirection, String)>>,
}

impl Page {
    /// Builds the window from `start`/`length` and the order list. Order
    /// entries referencing non-orderable (or out-of-range) columns are
    /// dropped. `length == -1` widens the window to every row from the
    /// start of the result set.
    pub fn from_request(request: &TableRequest) -> Self {
        let mut sort = Vec::new();
        for order in &request.order {
            if let Some(column) = request.columns.get(order.column) {
                if column.orderable {
                    sort.push((order.dir, column.data.clone()));
                }
            }
        }

        let (offset, page_size) = if request.length == -1 {
            (0, i64::MAX)
        } else {
            (request.start, request.length)
        };

        Self {
            offset,
            page_size,
            sort: if sort.is_empty() { None } else { Some(sort) },
        }
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
    }

    pub fn sort(&self) -> Option<&[(SortDirection, String)]> {
        self.sort.as_deref()
    }

    pub fn next(&self) -> Result<Self> {
        Err(Error::UnsupportedPaging("next"))
    }

    pub fn previous_or_first(&self) -> Result<Self> {
        Err(Error::UnsupportedPaging("previous_or_first"))
    }

    pub fn first(&self) -> Result<Self> {
        Err(Error::UnsupportedPaging("first"))
    }

    pub fn has_previous(&self) -> Result<bool> {
        Err(Error::UnsupportedPaging("has_previous"))
    }

    pub fn page_number(&self) -> Result<i64> {
        Err(Error::UnsupportedPaging("page_number"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::TableColumn;

    #[test]
    fn keeps_only_orderable_sort_entries() {
        let mut request = TableRequest::new();
        request.add_column_ordered(TableColumn::new("name"), SortDirection::Asc);
        request.add_column_ordered(
            TableColumn::new("secret").orderable(false),
            SortDirection::Desc,
        );
        request.start = 20;
        request.length = 10;

        let page = Page::from_request(&request);
        assert_eq!(page.offset(), 20);
        assert_eq!(page.page_size(), 10);
        assert_eq!(
            page.sort(),
            Some(&[(SortDirection::Asc, "name".to_string())][..])
        );
    }

    #[test]
    fn sort_is_absent_when_nothing_survives() {
        let mut request = TableRequest::new();
        request.add_column_ordered(
            TableColumn::new("name").orderable(false),
            SortDirection::Asc,
        );
        assert!(Page::from_request(&request).sort().is_none());
    }

    #[test]
    fn out_of_range_order_entries_are_dropped() {
        let mut request = TableRequest::new();
        request.add_column(TableColumn::new("name"));
        request.order.push(crate::request::OrderInstruction {
            column: 5,
            dir: SortDirection::Asc,
        });
        assert!(Page::from_request(&request).sort().is_none());
    }

    #[test]
    fn length_minus_one_means_all_rows_from_the_top() {
        let mut request = TableRequest::new();
        request.add_column(TableColumn::new("name"));
        request.start = 40;
        request.length = -1;

        let page = Page::from_request(&request);
        assert_eq!(page.offset(), 0);
        assert_eq!(page.page_size(), i64::MAX);
    }

    #[test]
    fn navigational_operations_fail_explicitly() {
        let page = Page::from_request(&TableRequest::new());
        assert!(matches!(page.next(), Err(Error::UnsupportedPaging("next"))));
        assert!(page.previous_or_first().is_err());
        assert!(page.first().is_err());
        assert!(page.has_previous().is_err());
        assert!(page.page_number().is_err());
    }
}
