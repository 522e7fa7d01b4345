use thiserror::Error;

use crate::model::ColumnType;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("row decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("request has no columns")]
    EmptyColumns,
    #[error("unknown column `{0}`")]
    UnknownColumn(String),
    #[error("unknown entity `{0}`")]
    UnknownEntity(String),
    #[error("cannot resolve `{segment}` in path `{path}` from entity `{entity}`")]
    UnknownAttribute {
        entity: String,
        segment: String,
        path: String,
    },
    #[error("column `{column}` has unsupported type {ty} for a global or-filter")]
    UnsupportedColumnType { column: String, ty: ColumnType },
    #[error("page navigation `{0}` is not supported")]
    UnsupportedPaging(&'static str),
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// True for failures raised while talking to the database, which
    /// `GridEngine::find_all` reports inside the result envelope instead
    /// of propagating.
    pub fn is_runtime(&self) -> bool {
        matches!(self, Error::Db(_) | Error::Decode(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub trait WithContext<T> {
    fn context(self, msg: impl Into<String>) -> Result<T>;
}

impl<T> WithContext<T> for Result<T> {
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Context {
            context: msg.into(),
            source: Box::new(e),
        })
    }
}
