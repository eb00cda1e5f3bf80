//! Record type descriptors
//!
//! Result rows are written into plain Rust structs through a [`RecordSchema`]:
//! an ordered map from field name to a typed setter, registered once per type.
//!
//! ```ignore
//! #[derive(Default)]
//! struct Employee {
//!     first_name: String,
//!     hire_date: Option<NaiveDate>,
//! }
//!
//! impl Record for Employee {
//!     fn schema() -> RecordSchema<Self> {
//!         RecordSchema::new()
//!             .field("FirstName", |e: &mut Employee, v: String| e.first_name = v)
//!             .field("HireDate", |e: &mut Employee, v: Option<NaiveDate>| e.hire_date = v)
//!     }
//! }
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use indexmap::IndexMap;
use uuid::Uuid;

use callbind_core::{CallError, Result, Value};

use crate::coerce::{self, Coerced};

/// Destination type of a record field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Bool,
    I16,
    I32,
    I64,
    U32,
    U64,
    F32,
    F64,
    String,
    Bytes,
    Uuid,
    Date,
    Time,
    DateTime,
    DateTimeUtc,
    Json,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Bool => "bool",
            FieldKind::I16 => "i16",
            FieldKind::I32 => "i32",
            FieldKind::I64 => "i64",
            FieldKind::U32 => "u32",
            FieldKind::U64 => "u64",
            FieldKind::F32 => "f32",
            FieldKind::F64 => "f64",
            FieldKind::String => "String",
            FieldKind::Bytes => "Vec<u8>",
            FieldKind::Uuid => "Uuid",
            FieldKind::Date => "NaiveDate",
            FieldKind::Time => "NaiveTime",
            FieldKind::DateTime => "NaiveDateTime",
            FieldKind::DateTimeUtc => "DateTime<Utc>",
            FieldKind::Json => "serde_json::Value",
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A Rust type that can receive a database value
pub trait FieldValue: Sized {
    const KIND: FieldKind;
    const NULLABLE: bool = false;

    /// Convert a non-NULL value
    fn from_value(value: &Value) -> Coerced<Self>;

    /// What a NULL becomes, if the type can hold one
    fn from_null() -> Option<Self> {
        None
    }
}

macro_rules! impl_field_value {
    ($($ty:ty => $kind:ident via $conv:expr),* $(,)?) => {
        $(
            impl FieldValue for $ty {
                const KIND: FieldKind = FieldKind::$kind;

                fn from_value(value: &Value) -> Coerced<Self> {
                    $conv(value)
                }
            }
        )*
    };
}

impl_field_value! {
    bool => Bool via coerce::to_bool,
    i16 => I16 via coerce::to_integer::<i16>,
    i32 => I32 via coerce::to_integer::<i32>,
    i64 => I64 via coerce::to_integer::<i64>,
    u32 => U32 via coerce::to_integer::<u32>,
    u64 => U64 via coerce::to_integer::<u64>,
    f32 => F32 via coerce::to_f32,
    f64 => F64 via coerce::to_f64,
    String => String via coerce::to_string,
    Vec<u8> => Bytes via coerce::to_bytes,
    Uuid => Uuid via coerce::to_uuid,
    NaiveDate => Date via coerce::to_date,
    NaiveTime => Time via coerce::to_time,
    NaiveDateTime => DateTime via coerce::to_datetime,
    DateTime<Utc> => DateTimeUtc via coerce::to_datetime_utc,
    serde_json::Value => Json via coerce::to_json,
}

impl<T: FieldValue> FieldValue for Option<T> {
    const KIND: FieldKind = T::KIND;
    const NULLABLE: bool = true;

    fn from_value(value: &Value) -> Coerced<Self> {
        T::from_value(value).map(Some)
    }

    fn from_null() -> Option<Self> {
        Some(None)
    }
}

/// Convert a value to `V`, mapping failures to [`CallError::TypeMismatch`]
pub fn convert<V: FieldValue>(value: &Value) -> Result<V> {
    let converted = if value.is_null() {
        V::from_null().ok_or_else(|| "value is NULL".to_string())
    } else {
        V::from_value(value)
    };
    converted.map_err(|diagnostic| {
        CallError::type_mismatch(value.kind().to_string(), V::KIND.to_string(), diagnostic)
    })
}

type Setter<T> = Box<dyn Fn(&mut T, &Value) -> Coerced<()>>;

/// One settable field of a record type
pub struct FieldDescriptor<T> {
    name: String,
    kind: FieldKind,
    nullable: bool,
    setter: Setter<T>,
}

impl<T> FieldDescriptor<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    /// Coerce `value` to this field's type and store it in `record`
    pub fn assign(&self, record: &mut T, value: &Value) -> Result<()> {
        (self.setter)(record, value).map_err(|diagnostic| {
            CallError::type_mismatch(value.kind().to_string(), self.kind.to_string(), diagnostic)
        })
    }
}

impl<T> std::fmt::Debug for FieldDescriptor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("nullable", &self.nullable)
            .finish_non_exhaustive()
    }
}

/// Field map of a record type, in registration order
pub struct RecordSchema<T> {
    fields: IndexMap<String, FieldDescriptor<T>>,
}

impl<T: 'static> RecordSchema<T> {
    pub fn new() -> Self {
        Self {
            fields: IndexMap::new(),
        }
    }

    /// Register a field. Registering the same name again replaces the setter.
    pub fn field<V>(mut self, name: impl Into<String>, setter: fn(&mut T, V)) -> Self
    where
        V: FieldValue + 'static,
    {
        let name = name.into();
        let descriptor = FieldDescriptor {
            name: name.clone(),
            kind: V::KIND,
            nullable: V::NULLABLE,
            setter: Box::new(move |record: &mut T, value: &Value| {
                setter(record, V::from_value(value)?);
                Ok(())
            }),
        };
        self.fields.insert(name, descriptor);
        self
    }
}

impl<T: 'static> Default for RecordSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RecordSchema<T> {
    pub fn get(&self, name: &str) -> Option<&FieldDescriptor<T>> {
        self.fields.get(name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<T> std::fmt::Debug for RecordSchema<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.fields.values()).finish()
    }
}

/// A type that result rows can be bound into
pub trait Record: Default + Sized + 'static {
    fn schema() -> RecordSchema<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Employee {
        first_name: String,
        employee_id: i32,
        department_id: u32,
        hire_date: Option<NaiveDate>,
    }

    impl Record for Employee {
        fn schema() -> RecordSchema<Self> {
            RecordSchema::new()
                .field("FirstName", |e: &mut Employee, v: String| e.first_name = v)
                .field("EmployeeID", |e: &mut Employee, v: i32| e.employee_id = v)
                .field("DepartmentID", |e: &mut Employee, v: u32| e.department_id = v)
                .field("HireDate", |e: &mut Employee, v: Option<NaiveDate>| e.hire_date = v)
        }
    }

    #[test]
    fn test_schema_keeps_registration_order() {
        let schema = Employee::schema();
        assert_eq!(
            schema.field_names(),
            vec!["FirstName", "EmployeeID", "DepartmentID", "HireDate"]
        );
    }

    #[test]
    fn test_optional_fields_unwrap_to_inner_kind() {
        let schema = Employee::schema();
        let hire_date = schema.get("HireDate").unwrap();
        assert_eq!(hire_date.kind(), FieldKind::Date);
        assert!(hire_date.nullable());
        assert!(!schema.get("FirstName").unwrap().nullable());
    }

    #[test]
    fn test_assign_coerces_value() {
        let schema = Employee::schema();
        let mut employee = Employee::default();

        schema
            .get("DepartmentID")
            .unwrap()
            .assign(&mut employee, &Value::Decimal("50".into()))
            .unwrap();
        schema
            .get("HireDate")
            .unwrap()
            .assign(&mut employee, &Value::String("2004-08-17".into()))
            .unwrap();

        assert_eq!(employee.department_id, 50);
        assert_eq!(employee.hire_date, NaiveDate::from_ymd_opt(2004, 8, 17));
    }

    #[test]
    fn test_assign_reports_type_mismatch() {
        let schema = Employee::schema();
        let mut employee = Employee::default();

        let err = schema
            .get("EmployeeID")
            .unwrap()
            .assign(&mut employee, &Value::String("Alexis".into()))
            .unwrap_err();

        match err {
            CallError::TypeMismatch {
                source_type,
                target_type,
                diagnostic,
                ..
            } => {
                assert_eq!(source_type, "String");
                assert_eq!(target_type, "i32");
                assert!(diagnostic.contains("Alexis"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(employee, Employee::default());
    }

    #[test]
    fn test_convert_handles_null() {
        assert_eq!(convert::<Option<f64>>(&Value::Null).unwrap(), None);
        assert!(matches!(
            convert::<f64>(&Value::Null),
            Err(CallError::TypeMismatch { ref source_type, .. }) if source_type == "NULL"
        ));
        assert_eq!(convert::<f64>(&Value::Float64(5.1)).unwrap(), 5.1);
    }
}
