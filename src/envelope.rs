use serde::{Deserialize, Serialize};

/// The envelope the table widget expects back: the echoed draw counter,
/// the two counts, the page of rows, and an error message when a query
/// stage failed at runtime.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableResult<R> {
    pub draw: u32,
    #[serde(rename = "recordsTotal")]
    pub records_total: i64,
    #[serde(rename = "recordsFiltered")]
    pub records_filtered: i64,
    pub data: Vec<R>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<R> TableResult<R> {
    pub fn new(draw: u32) -> Self {
        Self {
            draw,
            records_total: 0,
            records_filtered: 0,
            data: Vec::new(),
            error: None,
        }
    }
}
