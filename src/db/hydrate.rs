//! Row hydration.
//!
//! Turns the current row of a cursor into a typed value. Scalar targets take
//! the first cell; every other target is default-constructed and then filled
//! from columns whose names exactly match one of its writable fields.
//!
//! Field tables are static and generated at compile time by the [`record!`]
//! macro (or written by hand), so no per-call type inspection happens.
//!
//! [`record!`]: crate::record

use crate::db::coerce::coerce;
use crate::db::types::{TargetType, is_struct_type};
use crate::models::{Row, SqlValue};
use chrono::NaiveDateTime;
use tracing::trace;
use uuid::Uuid;

/// Read access to the current row of a result set.
pub trait RowCursor {
    fn field_count(&self) -> usize;

    /// Column name at `index`.
    fn name(&self, index: usize) -> &str;

    /// Cell value at `index`.
    fn value(&self, index: usize) -> &SqlValue;
}

impl RowCursor for Row {
    fn field_count(&self) -> usize {
        self.len()
    }

    fn name(&self, index: usize) -> &str {
        &self.columns()[index]
    }

    fn value(&self, index: usize) -> &SqlValue {
        &self.values()[index]
    }
}

/// A named field of a record type.
pub struct Field<T: 'static> {
    pub name: &'static str,
    /// Declared type, for diagnostics.
    pub type_name: &'static str,
    /// Whether the field is visible outside its module and may be assigned.
    pub exported: bool,
    pub assign: fn(&mut T, &SqlValue),
}

impl<T: 'static> Field<T> {
    pub fn is_writable(&self) -> bool {
        self.exported
    }
}

impl<T: 'static> std::fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("exported", &self.exported)
            .finish_non_exhaustive()
    }
}

/// A type that can be produced from a result row.
///
/// Scalar types override `coerce_cell`; record types override `fields`.
pub trait Hydrate: Default + 'static {
    const TARGET: TargetType;

    /// Convert a single cell. Used when `TARGET` is a scalar.
    fn coerce_cell(_value: &SqlValue) -> Self {
        Self::default()
    }

    /// Field table. Used when `TARGET` is not a scalar.
    fn fields() -> &'static [Field<Self>] {
        &[]
    }
}

macro_rules! impl_hydrate_scalar {
    ($($ty:ty => $target:ident),+ $(,)?) => {
        $(
            impl Hydrate for $ty {
                const TARGET: TargetType = TargetType::$target;

                fn coerce_cell(value: &SqlValue) -> Self {
                    coerce::<$ty>(value)
                }
            }
        )+
    };
}

impl_hydrate_scalar!(
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
    NaiveDateTime => DateTime,
    Uuid => Uuid,
    String => Text,
);

/// The fields of `T` that hydration may assign.
pub fn writable_fields<T: Hydrate>() -> Vec<&'static Field<T>> {
    T::fields().iter().filter(|f| f.is_writable()).collect()
}

/// Hydrate the current row, choosing the scalar or record path by `T::TARGET`.
pub fn hydrate<T, R>(row: &R) -> T
where
    T: Hydrate,
    R: RowCursor + ?Sized,
{
    if is_struct_type(Some(&T::TARGET)) {
        hydrate_scalar(row)
    } else {
        hydrate_record(row)
    }
}

/// Coerce the first cell of the row. A row without cells yields the default.
pub fn hydrate_scalar<T, R>(row: &R) -> T
where
    T: Hydrate,
    R: RowCursor + ?Sized,
{
    if row.field_count() == 0 {
        return T::default();
    }
    T::coerce_cell(row.value(0))
}

/// Fill a default instance of `T` from columns matching its writable fields.
///
/// Names match exactly (case-sensitive). Unmatched columns are dropped and
/// unmatched fields keep their default.
pub fn hydrate_record<T, R>(row: &R) -> T
where
    T: Hydrate,
    R: RowCursor + ?Sized,
{
    let mut item = T::default();
    let fields = writable_fields::<T>();

    for idx in 0..row.field_count() {
        let column = row.name(idx);
        match fields.iter().find(|f| f.name == column) {
            Some(field) => (field.assign)(&mut item, row.value(idx)),
            None => trace!(column, target = T::TARGET.name(), "No field for column"),
        }
    }

    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[derive(Debug, Default, PartialEq)]
    struct Manual {
        a: i32,
        b: String,
        hidden: i32,
    }

    impl Hydrate for Manual {
        const TARGET: TargetType = TargetType::Other("Manual");

        fn fields() -> &'static [Field<Self>] {
            const FIELDS: &[Field<Manual>] = &[
                Field {
                    name: "A",
                    type_name: "i32",
                    exported: true,
                    assign: |item: &mut Manual, value: &SqlValue| item.a = coerce(value),
                },
                Field {
                    name: "B",
                    type_name: "String",
                    exported: true,
                    assign: |item: &mut Manual, value: &SqlValue| item.b = coerce(value),
                },
                Field {
                    name: "Hidden",
                    type_name: "i32",
                    exported: false,
                    assign: |item: &mut Manual, value: &SqlValue| item.hidden = coerce(value),
                },
            ];
            FIELDS
        }
    }

    #[test]
    fn test_record_matches_by_exact_name() {
        let row = Row::new().with("A", "7").with("C", "x");
        let item: Manual = hydrate(&row);
        assert_eq!(
            item,
            Manual {
                a: 7,
                b: String::new(),
                hidden: 0
            }
        );
    }

    #[test]
    fn test_record_name_match_is_case_sensitive() {
        let row = Row::new().with("a", 7).with("b", "x");
        let item: Manual = hydrate(&row);
        assert_eq!(item, Manual::default());
    }

    #[test]
    fn test_record_skips_non_writable_fields() {
        let row = Row::new().with("Hidden", 99).with("B", "seen");
        let item: Manual = hydrate(&row);
        assert_eq!(item.hidden, 0);
        assert_eq!(item.b, "seen");

        let names: Vec<_> = writable_fields::<Manual>().iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_record_malformed_cell_degrades_single_field() {
        let row = Row::new().with("A", "abc").with("B", "ok");
        let item: Manual = hydrate(&row);
        assert_eq!(item.a, 0);
        assert_eq!(item.b, "ok");
    }

    #[test]
    fn test_record_duplicate_columns_assign_in_order() {
        let row = Row::new().with("A", 1).with("A", 2);
        let item: Manual = hydrate(&row);
        assert_eq!(item.a, 2);
    }

    #[test]
    fn test_empty_row_gives_default_record() {
        let item: Manual = hydrate(&Row::new());
        assert_eq!(item, Manual::default());
    }

    #[test]
    fn test_scalar_uses_first_cell_only() {
        let row = Row::new().with("total", 12).with("other", 99);
        assert_eq!(hydrate::<i64, _>(&row), 12);
        assert_eq!(hydrate::<String, _>(&row), "12");
    }

    #[test]
    fn test_scalar_identity_for_each_scalar_type() {
        let dt = NaiveDate::from_ymd_opt(2023, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        let id = Uuid::new_v4();

        assert_eq!(hydrate::<i16, _>(&Row::new().with("v", 5i16)), 5);
        assert_eq!(hydrate::<i32, _>(&Row::new().with("v", 6)), 6);
        assert_eq!(hydrate::<i64, _>(&Row::new().with("v", 7i64)), 7);
        assert_eq!(hydrate::<f32, _>(&Row::new().with("v", 0.25f32)), 0.25);
        assert_eq!(hydrate::<f64, _>(&Row::new().with("v", 0.5)), 0.5);
        assert_eq!(hydrate::<NaiveDateTime, _>(&Row::new().with("v", dt)), dt);
        assert_eq!(hydrate::<Uuid, _>(&Row::new().with("v", id)), id);
        assert_eq!(hydrate::<String, _>(&Row::new().with("v", "text")), "text");
    }

    #[test]
    fn test_scalar_empty_row_is_default() {
        assert_eq!(hydrate::<i32, _>(&Row::new()), 0);
    }
}
