//! Row-to-record binding

use callbind_core::{CallError, Cursor, Result};

use crate::binding::BindingTable;
use crate::record::{FieldDescriptor, RecordSchema};

/// Writes cursor rows into records of type `T`.
///
/// The column → field plan is resolved once from the binding table, so a
/// binding that names a missing field fails before any row is read.
pub struct ResultBinder<'a, T> {
    /// Indexed by column position; `None` for columns nothing is bound to
    plan: Vec<Option<(&'a str, &'a FieldDescriptor<T>)>>,
}

impl<'a, T: Default> ResultBinder<'a, T> {
    /// Resolve `bindings` against the result `columns` and the record `schema`.
    ///
    /// When the result set repeats a column name, only its first occurrence
    /// is bound.
    pub fn new(
        schema: &'a RecordSchema<T>,
        bindings: &'a BindingTable,
        columns: &'a [String],
    ) -> Result<Self> {
        for binding in bindings.iter() {
            if schema.get(&binding.field).is_none() {
                return Err(CallError::UnknownField(binding.field.clone()));
            }
        }

        let mut plan = Vec::with_capacity(columns.len());
        for (position, column) in columns.iter().enumerate() {
            let first_occurrence = columns.iter().position(|c| c == column) == Some(position);
            let target = bindings
                .for_column(column)
                .filter(|_| first_occurrence)
                .and_then(|binding| schema.get(&binding.field))
                .map(|field| (column.as_str(), field));
            plan.push(target);
        }

        Ok(Self { plan })
    }

    /// Number of columns that feed a field
    pub fn bound_columns(&self) -> usize {
        self.plan.iter().flatten().count()
    }

    /// Build one record from the cursor's current row.
    ///
    /// NULL cells are skipped, leaving the field at its default.
    pub fn bind_row<C: Cursor>(&self, cursor: &C) -> Result<T> {
        let mut record = T::default();
        for (index, target) in self.plan.iter().enumerate() {
            let Some((column, field)) = target else {
                continue;
            };
            let value = cursor.value_at(index)?;
            if value.is_null() {
                continue;
            }
            field
                .assign(&mut record, &value)
                .map_err(|e| e.in_column(column))?;
        }
        Ok(record)
    }

    /// Drain the cursor, one record per row in cursor order
    pub fn bind_all<C: Cursor>(&self, cursor: &mut C) -> Result<Vec<T>> {
        let mut records = Vec::new();
        while cursor.next_row()? {
            records.push(self.bind_row(cursor)?);
            tracing::trace!(row = records.len(), "row bound");
        }
        Ok(records)
    }
}
