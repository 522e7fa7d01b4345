use std::collections::HashMap;
use std::fmt;

/// Storage type of a mapped column, as far as the filter builders care.
///
/// Text columns are folded to lowercase before a `like` comparison,
/// integer columns are cast to text without folding, and boolean columns
/// only ever participate in equality filters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Boolean,
}

impl ColumnType {
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Integer => "integer",
            ColumnType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an attribute name on an entity maps onto storage.
#[derive(Clone, Debug)]
pub enum AttributeKind {
    /// A plain column on the entity's own table.
    Column { column: String, ty: ColumnType },
    /// A component flattened into the entity's table. Field names map to
    /// prefixed columns, so `address.city` reads from the root table and
    /// never joins.
    Embedded {
        fields: HashMap<String, (String, ColumnType)>,
    },
    /// A to-one link to another registered entity, realized as an inner
    /// join when a dotted path walks through it.
    Association {
        entity: String,
        local_column: String,
        target_column: String,
    },
}

/// Table mapping for one entity: its table name plus named attributes.
#[derive(Clone, Debug)]
pub struct EntityModel {
    name: String,
    table: String,
    attributes: HashMap<String, AttributeKind>,
}

impl EntityModel {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            attributes: HashMap::new(),
        }
    }

    /// Declares a column whose attribute name equals the column name.
    pub fn column(self, name: impl Into<String>, ty: ColumnType) -> Self {
        let name = name.into();
        let column = name.clone();
        self.column_as(name, column, ty)
    }

    /// Declares a column whose attribute name differs from the column name.
    pub fn column_as(
        mut self,
        name: impl Into<String>,
        column: impl Into<String>,
        ty: ColumnType,
    ) -> Self {
        self.attributes.insert(
            name.into(),
            AttributeKind::Column {
                column: column.into(),
                ty,
            },
        );
        self
    }

    /// Declares an embedded component. Each entry maps a field name to the
    /// column it is flattened into on this entity's table.
    pub fn embedded<N, F, C>(mut self, name: N, fields: impl IntoIterator<Item = (F, C, ColumnType)>) -> Self
    where
        N: Into<String>,
        F: Into<String>,
        C: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|(field, column, ty)| (field.into(), (column.into(), ty)))
            .collect();
        self.attributes
            .insert(name.into(), AttributeKind::Embedded { fields });
        self
    }

    /// Declares a to-one association. `local_column` lives on this entity's
    /// table and references `target_column` on the target entity's table.
    pub fn belongs_to(
        mut self,
        name: impl Into<String>,
        entity: impl Into<String>,
        local_column: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        self.attributes.insert(
            name.into(),
            AttributeKind::Association {
                entity: entity.into(),
                local_column: local_column.into(),
                target_column: target_column.into(),
            },
        );
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeKind> {
        self.attributes.get(name)
    }
}

/// All entity mappings known to an engine, keyed by entity name.
///
/// Lookups are constant-time; path resolution consults the registry once
/// per association segment.
#[derive(Clone, Debug, Default)]
pub struct ModelRegistry {
    entities: HashMap<String, EntityModel>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, model: EntityModel) -> &mut Self {
        self.entities.insert(model.name.clone(), model);
        self
    }

    pub fn entity(&self, name: &str) -> Option<&EntityModel> {
        self.entities.get(name)
    }
}
