//! Column-to-field bindings
//!
//! A binding says "fill field F from result column C". Callers register
//! explicit bindings up front; when auto-bind is on, the remaining columns are
//! matched to fields by normalized name once the result set is known.

use std::collections::{HashMap, HashSet};

use callbind_core::{CallError, Result};

use crate::normalize::normalize_name;

/// One column → field association
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub column: String,
    pub field: String,
    /// Derived by auto-fill rather than registered by the caller
    pub automatic: bool,
}

/// The bindings consumed by one execution
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    bindings: Vec<Binding>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an explicit binding. Conflicts are reported by [`Self::validate`].
    pub fn add_binding(&mut self, column: impl Into<String>, field: impl Into<String>) {
        self.bindings.push(Binding {
            column: column.into(),
            field: field.into(),
            automatic: false,
        });
    }

    /// Bind every column that has no explicit binding to the single field with
    /// the same normalized name.
    ///
    /// Columns without a match, or with several, stay unbound. Fields that
    /// already have an explicit binding are not candidates.
    pub fn auto_fill<C, F>(&mut self, columns: &[C], fields: &[F])
    where
        C: AsRef<str>,
        F: AsRef<str>,
    {
        let taken_fields: HashSet<String> = self.bindings.iter().map(|b| b.field.clone()).collect();

        let mut candidates: HashMap<String, Vec<&str>> = HashMap::new();
        for field in fields.iter().map(AsRef::as_ref) {
            if taken_fields.contains(field) {
                continue;
            }
            candidates.entry(normalize_name(field)).or_default().push(field);
        }

        for column in columns.iter().map(AsRef::as_ref) {
            if self.bindings.iter().any(|b| b.column == column) {
                continue;
            }
            match candidates.get(&normalize_name(column)).map(Vec::as_slice) {
                Some([field]) => {
                    tracing::trace!(column, field, "auto-bound column");
                    self.bindings.push(Binding {
                        column: column.to_string(),
                        field: field.to_string(),
                        automatic: true,
                    });
                }
                Some(fields) => {
                    tracing::trace!(column, matches = fields.len(), "column matches several fields, left unbound");
                }
                None => {}
            }
        }
    }

    /// Reject bindings that would make a field's value depend on column order:
    /// one field targeted twice, or one column bound twice.
    pub fn validate(&self) -> Result<()> {
        let mut fields: HashMap<&str, &str> = HashMap::new();
        let mut columns: HashSet<&str> = HashSet::new();

        for binding in &self.bindings {
            if let Some(previous) = fields.insert(&binding.field, &binding.column) {
                return Err(CallError::AmbiguousBinding(format!(
                    "field {} is bound to both {} and {}",
                    binding.field, previous, binding.column
                )));
            }
            if !columns.insert(&binding.column) {
                return Err(CallError::AmbiguousBinding(format!(
                    "column {} is bound more than once",
                    binding.column
                )));
            }
        }
        Ok(())
    }

    /// Fail with [`CallError::UnknownColumn`] for the first binding whose column
    /// is not in the result set. Column names compare exactly.
    pub fn validate_against_columns<C: AsRef<str>>(&self, columns: &[C]) -> Result<()> {
        for binding in &self.bindings {
            if !columns.iter().any(|c| c.as_ref() == binding.column) {
                return Err(CallError::UnknownColumn(binding.column.clone()));
            }
        }
        Ok(())
    }

    /// The binding that feeds from `column`
    pub fn for_column(&self, column: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.column == column)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
