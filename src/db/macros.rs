//! Record declaration macro.
//!
//! `record!` declares a struct and generates its `Hydrate` field table at
//! compile time, so hydration never inspects types at runtime.

/// Declare a record type that can be hydrated from named result columns.
///
/// Every field is listed in the generated table. Fields declared with a
/// visibility (`pub`, `pub(crate)`, ...) are writable; private fields are
/// skipped by hydration and keep their default. Column names must match the
/// field identifier exactly. The struct must implement `Default`.
///
/// # Example
///
/// ```
/// use sproc_adapter::record;
///
/// record! {
///     #[derive(Debug, Default)]
///     pub struct Customer {
///         pub Id: i32,
///         pub Name: String,
///         pub Email: Option<String>,
///         audit_token: String,
///     }
/// }
///
/// let row = sproc_adapter::Row::new().with("Id", "7").with("Name", "Ada");
/// let customer: Customer = sproc_adapter::db::hydrate(&row);
/// assert_eq!(customer.Id, 7);
/// assert_eq!(customer.Email, None);
/// ```
#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[allow(non_snake_case)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        impl $crate::db::Hydrate for $name {
            const TARGET: $crate::db::TargetType = $crate::db::TargetType::Other(stringify!($name));

            fn fields() -> &'static [$crate::db::Field<Self>] {
                const FIELDS: &[$crate::db::Field<$name>] = &[
                    $(
                        $crate::db::Field {
                            name: stringify!($field),
                            type_name: stringify!($ty),
                            exported: !stringify!($field_vis).is_empty(),
                            assign: |item: &mut $name, value: &$crate::models::SqlValue| {
                                item.$field = $crate::db::coerce::<$ty>(value);
                            },
                        },
                    )*
                ];
                FIELDS
            }
        }
    };
}
