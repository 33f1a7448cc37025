#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! # `odata-query` - typed `OData` query descriptions
//!
//! Builds `OData` system query options (`$filter`, `$orderby`, `$select`, ...)
//! from typed field references and flattens them into the parameter mapping
//! consumed by the entity service.
//!
//! ```rust,ignore
//! use odata_query::{QueryBuilder, QueryParams, SortDir};
//!
//! let query = QueryBuilder::<UserSchema>::new()
//!     .filter(NAME.contains("john").and(AGE.ge(18)))
//!     .order_by(NAME, SortDir::Asc)
//!     .top(20)
//!     .count(true)
//!     .build();
//!
//! let params = query.to_parameter_mapping();
//! assert_eq!(params["$top"], "20");
//! ```

pub mod builder;
pub mod params;
pub mod schema;

pub use builder::QueryBuilder;
pub use params::QueryParams;
pub use schema::{FieldRef, Schema};

pub mod ast {
    use bigdecimal::BigDecimal;
    use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
    use std::fmt;
    use uuid::Uuid;

    #[derive(Clone, Debug)]
    pub enum Expr {
        And(Box<Expr>, Box<Expr>),
        Or(Box<Expr>, Box<Expr>),
        Not(Box<Expr>),
        Compare(Box<Expr>, CompareOperator, Box<Expr>),
        In(Box<Expr>, Vec<Expr>),
        Function(String, Vec<Expr>),
        Identifier(String),
        Value(Value),
    }

    impl Expr {
        /// Combine two expressions with AND: `expr1 and expr2`
        ///
        /// # Example
        ///
        /// ```rust,ignore
        /// let filter = ID.eq(user_id).and(NAME.contains("john"));
        /// ```
        #[must_use]
        pub fn and(self, other: Expr) -> Expr {
            Expr::And(Box::new(self), Box::new(other))
        }

        /// Combine two expressions with OR: `expr1 or expr2`
        #[must_use]
        pub fn or(self, other: Expr) -> Expr {
            Expr::Or(Box::new(self), Box::new(other))
        }

        /// Negate an expression: `not (expr)`
        #[must_use]
        #[allow(clippy::should_implement_trait)]
        pub fn not(self) -> Expr {
            !self
        }

        fn is_logical(&self) -> bool {
            matches!(self, Expr::And(..) | Expr::Or(..))
        }

        fn fmt_operand(&self, parent_is_and: bool, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let mixed = match self {
                Expr::And(..) => !parent_is_and,
                Expr::Or(..) => parent_is_and,
                _ => false,
            };
            if mixed {
                write!(f, "({self})")
            } else {
                write!(f, "{self}")
            }
        }
    }

    impl std::ops::Not for Expr {
        type Output = Expr;

        fn not(self) -> Self::Output {
            Expr::Not(Box::new(self))
        }
    }

    /// Renders the expression as `$filter` text.
    impl fmt::Display for Expr {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Expr::And(a, b) => {
                    a.fmt_operand(true, f)?;
                    f.write_str(" and ")?;
                    b.fmt_operand(true, f)
                }
                Expr::Or(a, b) => {
                    a.fmt_operand(false, f)?;
                    f.write_str(" or ")?;
                    b.fmt_operand(false, f)
                }
                Expr::Not(inner) => write!(f, "not ({inner})"),
                Expr::Compare(l, op, r) => {
                    if l.is_logical() {
                        write!(f, "({l})")?;
                    } else {
                        write!(f, "{l}")?;
                    }
                    write!(f, " {op} {r}")
                }
                Expr::In(l, list) => {
                    write!(f, "{l} in (")?;
                    for (i, item) in list.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{item}")?;
                    }
                    f.write_str(")")
                }
                Expr::Function(name, args) => {
                    write!(f, "{name}(")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    f.write_str(")")
                }
                Expr::Identifier(name) => f.write_str(name),
                Expr::Value(v) => write!(f, "{v}"),
            }
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum CompareOperator {
        Eq,
        Ne,
        Gt,
        Ge,
        Lt,
        Le,
    }

    impl fmt::Display for CompareOperator {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let op = match self {
                CompareOperator::Eq => "eq",
                CompareOperator::Ne => "ne",
                CompareOperator::Gt => "gt",
                CompareOperator::Ge => "ge",
                CompareOperator::Lt => "lt",
                CompareOperator::Le => "le",
            };
            f.write_str(op)
        }
    }

    #[derive(Clone, Debug)]
    pub enum Value {
        Null,
        Bool(bool),
        Number(BigDecimal),
        Uuid(Uuid),
        DateTime(DateTime<Utc>),
        Date(NaiveDate),
        Time(NaiveTime),
        String(String),
    }

    /// Renders the value as an `OData` literal.
    impl fmt::Display for Value {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Value::Null => f.write_str("null"),
                Value::Bool(b) => write!(f, "{b}"),
                Value::Number(n) => write!(f, "{n}"),
                Value::Uuid(u) => write!(f, "{u}"),
                Value::DateTime(dt) => {
                    f.write_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
                }
                Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
                Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
                Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            }
        }
    }
}

// Ordering primitives
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SortDir {
    #[serde(rename = "asc")]
    Asc,
    #[serde(rename = "desc")]
    Desc,
}

impl SortDir {
    /// Reverse the sort direction (Asc <-> Desc)
    #[must_use]
    pub fn reverse(self) -> Self {
        match self {
            SortDir::Asc => SortDir::Desc,
            SortDir::Desc => SortDir::Asc,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SortDir::Asc => "asc",
            SortDir::Desc => "desc",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderKey {
    pub field: String,
    pub dir: SortDir,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct ODataOrderBy(pub Vec<OrderKey>);

impl ODataOrderBy {
    pub fn empty() -> Self {
        Self(vec![])
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Renders as the `$orderby` value, e.g. `name asc,id desc`.
impl std::fmt::Display for ODataOrderBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{} {}", key.field, key.dir.as_str())?;
        }
        Ok(())
    }
}

/// A fully described `OData` query. Every option is optional; absent options
/// are simply not rendered.
#[derive(Clone, Debug, Default)]
#[must_use]
pub struct ODataQuery {
    pub filter: Option<Box<ast::Expr>>,
    pub order: ODataOrderBy,
    pub select: Option<Vec<String>>,
    pub expand: Option<Vec<String>>,
    pub top: Option<u64>,
    pub skip: Option<u64>,
    pub count: bool,
    pub search: Option<String>,
}

impl ODataQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, expr: ast::Expr) -> Self {
        self.filter = Some(Box::new(expr));
        self
    }

    pub fn with_order(mut self, order: ODataOrderBy) -> Self {
        self.order = order;
        self
    }

    pub fn with_select(mut self, fields: Vec<String>) -> Self {
        self.select = Some(fields);
        self
    }

    pub fn with_expand(mut self, fields: Vec<String>) -> Self {
        self.expand = Some(fields);
        self
    }

    pub fn with_top(mut self, top: u64) -> Self {
        self.top = Some(top);
        self
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_count(mut self, count: bool) -> Self {
        self.count = count;
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Get filter as AST
    #[must_use]
    pub fn filter(&self) -> Option<&ast::Expr> {
        self.filter.as_deref()
    }

    /// Check if filter is present
    #[must_use]
    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// Get selected fields
    #[must_use]
    pub fn selected_fields(&self) -> Option<&[String]> {
        self.select.as_deref()
    }
}

impl From<Option<ast::Expr>> for ODataQuery {
    fn from(opt: Option<ast::Expr>) -> Self {
        match opt {
            Some(e) => Self::default().with_filter(e),
            None => Self::default(),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::ast::{CompareOperator, Expr, Value};
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn ident(name: &str) -> Expr {
        Expr::Identifier(name.to_owned())
    }

    fn cmp(name: &str, op: CompareOperator, v: Value) -> Expr {
        Expr::Compare(Box::new(ident(name)), op, Box::new(Expr::Value(v)))
    }

    #[test]
    fn test_string_literal_escapes_quotes() {
        let v = Value::String("O'Brien".to_owned());
        assert_eq!(v.to_string(), "'O''Brien'");
    }

    #[test]
    fn test_scalar_literals() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Number(42.into()).to_string(), "42");
        assert_eq!(
            Value::Date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()).to_string(),
            "2024-03-09"
        );
        let dt = Utc.with_ymd_and_hms(2024, 3, 9, 10, 30, 0).unwrap();
        assert_eq!(Value::DateTime(dt).to_string(), "2024-03-09T10:30:00Z");
    }

    #[test]
    fn test_and_inside_or_is_parenthesised() {
        let a = cmp("a", CompareOperator::Eq, Value::Number(1.into()));
        let b = cmp("b", CompareOperator::Gt, Value::Number(2.into()));
        let c = cmp("c", CompareOperator::Lt, Value::Number(3.into()));

        let expr = a.clone().or(b.clone()).and(c.clone());
        assert_eq!(expr.to_string(), "(a eq 1 or b gt 2) and c lt 3");

        let expr = a.and(b).and(c);
        assert_eq!(expr.to_string(), "a eq 1 and b gt 2 and c lt 3");
    }

    #[test]
    fn test_not_and_in_rendering() {
        let expr = Expr::In(
            Box::new(ident("status")),
            vec![
                Expr::Value(Value::String("open".to_owned())),
                Expr::Value(Value::String("closed".to_owned())),
            ],
        )
        .not();
        assert_eq!(expr.to_string(), "not (status in ('open', 'closed'))");
    }

    #[test]
    fn test_orderby_display() {
        let order = ODataOrderBy(vec![
            OrderKey {
                field: "name".to_owned(),
                dir: SortDir::Asc,
            },
            OrderKey {
                field: "id".to_owned(),
                dir: SortDir::Desc,
            },
        ]);
        assert_eq!(order.to_string(), "name asc,id desc");
        assert!(ODataOrderBy::empty().is_empty());
    }

    #[test]
    fn test_sort_dir_reverse() {
        assert_eq!(SortDir::Asc.reverse(), SortDir::Desc);
        assert_eq!(SortDir::Desc.reverse(), SortDir::Asc);
    }

    #[test]
    fn test_query_from_optional_filter() {
        let q: ODataQuery = None.into();
        assert!(!q.has_filter());

        let q: ODataQuery = Some(ident("active")).into();
        assert!(q.has_filter());
    }
}
