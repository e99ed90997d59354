//! Model definitions.

use super::field::FieldDef;

/// Name of the synthetic key every model starts with.
pub const DEFAULT_KEY: &str = "id";

/// A model: a named, ordered set of fields.
#[derive(Debug, Clone)]
pub struct ModelDef {
    name: String,
    table_name: Option<String>,
    fields: Vec<FieldDef>,
}

impl ModelDef {
    /// Create a model keyed by an auto-incrementing integer `id`.
    pub fn new(name: impl Into<String>) -> Self {
        Self::bare(name).with_field(FieldDef::integer(DEFAULT_KEY).pkey().auto_increment())
    }

    /// Create a model without the synthetic `id` key.
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_name: None,
            fields: Vec::new(),
        }
    }

    /// Create a model inheriting every field of `parent`.
    ///
    /// Fields added to the child afterwards replace parent fields of the
    /// same name in place.
    pub fn extends(name: impl Into<String>, parent: &ModelDef) -> Self {
        Self {
            name: name.into(),
            table_name: None,
            fields: parent.fields.iter().map(FieldDef::copy).collect(),
        }
    }

    /// Add a field, replacing any field with the same name.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.push_field(field);
        self
    }

    /// Remove a field, e.g. the inherited `id` when the child declares its own key.
    pub fn without_field(mut self, name: &str) -> Self {
        self.fields.retain(|f| f.name != name);
        self
    }

    /// Override the table name.
    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    pub(crate) fn push_field(&mut self, field: FieldDef) {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    pub(crate) fn fields_mut(&mut self) -> &mut [FieldDef] {
        &mut self.fields
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Physical table name: the explicit override or the plural of the model name.
    pub fn table_name(&self) -> String {
        self.table_name
            .clone()
            .unwrap_or_else(|| plural(&self.name.to_lowercase()))
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Persisted fields.
    pub fn registered_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.register)
    }

    /// Relation fields.
    pub fn relation_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.field_type.is_relation())
    }

    /// Primary key fields, in order.
    pub fn pkey_fields(&self) -> Vec<&FieldDef> {
        self.fields.iter().filter(|f| f.is_pkey()).collect()
    }

    /// Primary key field names, in order.
    pub fn pkey_names(&self) -> Vec<String> {
        self.pkey_fields().into_iter().map(|f| f.name.clone()).collect()
    }
}

/// English plural used for table names.
pub fn plural(name: &str) -> String {
    if let Some(stem) = name.strip_suffix('y') {
        format!("{}ies", stem)
    } else if name.ends_with('s') {
        format!("{}es", name)
    } else {
        format!("{}s", name)
    }
}
