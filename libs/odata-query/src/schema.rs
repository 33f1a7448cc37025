//! Typed field references for query building.
//!
//! - `Schema` trait: maps a field enum to wire names
//! - `FieldRef`: field reference carrying the schema and the Rust type of the field
//! - `IntoODataValue`: conversion of Rust values into `OData` literals

use crate::ast::{CompareOperator, Expr, Value};
use std::marker::PhantomData;

/// Schema trait defining field enums and their string mappings.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Copy, Clone, Eq, PartialEq)]
/// enum ProductField {
///     Id,
///     Name,
/// }
///
/// struct ProductSchema;
///
/// impl Schema for ProductSchema {
///     type Field = ProductField;
///
///     fn field_name(field: Self::Field) -> &'static str {
///         match field {
///             ProductField::Id => "Id",
///             ProductField::Name => "Name",
///         }
///     }
/// }
/// ```
pub trait Schema {
    /// The field enum type (must be Copy + Eq)
    type Field: Copy + Eq;

    /// Map a field enum to its wire name
    fn field_name(field: Self::Field) -> &'static str;
}

/// Type-safe field reference holding schema and Rust type information.
///
/// Equality is based solely on the schema field; `T` only restricts which
/// operations are available.
pub struct FieldRef<S: Schema, T> {
    field: S::Field,
    _phantom: PhantomData<(S, T)>,
}

impl<S: Schema, T> FieldRef<S, T> {
    /// Create a new typed field reference.
    ///
    /// ```rust,ignore
    /// const NAME: FieldRef<ProductSchema, String> = FieldRef::new(ProductField::Name);
    /// ```
    #[must_use]
    pub const fn new(field: S::Field) -> Self {
        Self {
            field,
            _phantom: PhantomData,
        }
    }

    /// Get the field name as a string.
    #[must_use]
    pub fn name(&self) -> &'static str {
        S::field_name(self.field)
    }

    fn identifier(&self) -> Expr {
        Expr::Identifier(self.name().to_owned())
    }

    fn compare<V: IntoODataValue>(self, op: CompareOperator, value: V) -> Expr {
        Expr::Compare(
            Box::new(self.identifier()),
            op,
            Box::new(Expr::Value(value.into_odata_value())),
        )
    }
}

impl<S: Schema, T> Clone for FieldRef<S, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: Schema, T> Copy for FieldRef<S, T> {}

impl<S: Schema, T> std::fmt::Debug for FieldRef<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldRef")
            .field("field", &self.name())
            .finish()
    }
}

impl<S: Schema, T> PartialEq for FieldRef<S, T> {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field
    }
}

impl<S: Schema, T> Eq for FieldRef<S, T> {}

/// Trait for extracting field names from field references.
///
/// Lets `order_by`, `select` and `expand` accept fields of any value type.
#[doc(hidden)]
pub trait AsFieldName {
    fn as_field_name(&self) -> &'static str;
}

impl<S: Schema, T> AsFieldName for FieldRef<S, T> {
    fn as_field_name(&self) -> &'static str {
        self.name()
    }
}

impl<T: AsFieldName + ?Sized> AsFieldName for &T {
    fn as_field_name(&self) -> &'static str {
        (*self).as_field_name()
    }
}

/// Trait for types that can be converted to `OData` AST values.
pub trait IntoODataValue {
    fn into_odata_value(self) -> Value;
}

impl IntoODataValue for bool {
    fn into_odata_value(self) -> Value {
        Value::Bool(self)
    }
}

impl IntoODataValue for uuid::Uuid {
    fn into_odata_value(self) -> Value {
        Value::Uuid(self)
    }
}

impl IntoODataValue for String {
    fn into_odata_value(self) -> Value {
        Value::String(self)
    }
}

impl IntoODataValue for &str {
    fn into_odata_value(self) -> Value {
        Value::String(self.to_owned())
    }
}

impl IntoODataValue for i32 {
    fn into_odata_value(self) -> Value {
        Value::Number(self.into())
    }
}

impl IntoODataValue for i64 {
    fn into_odata_value(self) -> Value {
        Value::Number(self.into())
    }
}

impl IntoODataValue for u32 {
    fn into_odata_value(self) -> Value {
        Value::Number(self.into())
    }
}

impl IntoODataValue for u64 {
    fn into_odata_value(self) -> Value {
        Value::Number(self.into())
    }
}

impl IntoODataValue for bigdecimal::BigDecimal {
    fn into_odata_value(self) -> Value {
        Value::Number(self)
    }
}

impl IntoODataValue for chrono::DateTime<chrono::Utc> {
    fn into_odata_value(self) -> Value {
        Value::DateTime(self)
    }
}

impl IntoODataValue for chrono::NaiveDate {
    fn into_odata_value(self) -> Value {
        Value::Date(self)
    }
}

impl IntoODataValue for chrono::NaiveTime {
    fn into_odata_value(self) -> Value {
        Value::Time(self)
    }
}

/// Comparison operations for any field type.
impl<S: Schema, T> FieldRef<S, T> {
    /// `field eq value`
    #[must_use]
    pub fn eq<V: IntoODataValue>(self, value: V) -> Expr {
        self.compare(CompareOperator::Eq, value)
    }

    /// `field ne value`
    #[must_use]
    pub fn ne<V: IntoODataValue>(self, value: V) -> Expr {
        self.compare(CompareOperator::Ne, value)
    }

    /// `field gt value`
    #[must_use]
    pub fn gt<V: IntoODataValue>(self, value: V) -> Expr {
        self.compare(CompareOperator::Gt, value)
    }

    /// `field ge value`
    #[must_use]
    pub fn ge<V: IntoODataValue>(self, value: V) -> Expr {
        self.compare(CompareOperator::Ge, value)
    }

    /// `field lt value`
    #[must_use]
    pub fn lt<V: IntoODataValue>(self, value: V) -> Expr {
        self.compare(CompareOperator::Lt, value)
    }

    /// `field le value`
    #[must_use]
    pub fn le<V: IntoODataValue>(self, value: V) -> Expr {
        self.compare(CompareOperator::Le, value)
    }

    /// `field eq null`
    #[must_use]
    pub fn is_null(self) -> Expr {
        Expr::Compare(
            Box::new(self.identifier()),
            CompareOperator::Eq,
            Box::new(Expr::Value(Value::Null)),
        )
    }

    /// `field ne null`
    #[must_use]
    pub fn is_not_null(self) -> Expr {
        Expr::Compare(
            Box::new(self.identifier()),
            CompareOperator::Ne,
            Box::new(Expr::Value(Value::Null)),
        )
    }

    /// Membership test: `field in (v1, v2, ...)`
    ///
    /// ```rust,ignore
    /// let filter = STATUS.in_list(["open", "pending"]);
    /// ```
    #[must_use]
    pub fn in_list<I>(self, values: I) -> Expr
    where
        I: IntoIterator,
        I::Item: IntoODataValue,
    {
        Expr::In(
            Box::new(self.identifier()),
            values
                .into_iter()
                .map(|v| Expr::Value(v.into_odata_value()))
                .collect(),
        )
    }
}

/// String-specific operations (only available for String fields).
impl<S: Schema> FieldRef<S, String> {
    /// `contains(field, 'value')`
    #[must_use]
    pub fn contains(self, substring: &str) -> Expr {
        self.string_function("contains", substring)
    }

    /// `startswith(field, 'prefix')`
    #[must_use]
    pub fn startswith(self, prefix: &str) -> Expr {
        self.string_function("startswith", prefix)
    }

    /// `endswith(field, 'suffix')`
    #[must_use]
    pub fn endswith(self, suffix: &str) -> Expr {
        self.string_function("endswith", suffix)
    }

    fn string_function(self, name: &str, arg: &str) -> Expr {
        Expr::Function(
            name.to_owned(),
            vec![self.identifier(), Expr::Value(Value::String(arg.to_owned()))],
        )
    }
}
