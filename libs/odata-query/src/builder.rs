//! Fluent builder producing `ODataQuery`.
//!
//! ```rust,ignore
//! use odata_query::{QueryBuilder, SortDir};
//!
//! let query = QueryBuilder::<ProductSchema>::new()
//!     .filter(PRICE.gt(10).and(NAME.contains("milk")))
//!     .order_by(NAME, SortDir::Asc)
//!     .select([NAME, PRICE])
//!     .top(50)
//!     .build();
//! ```

use crate::schema::{AsFieldName, Schema};
use crate::{ODataOrderBy, ODataQuery, OrderKey, SortDir, ast::Expr};
use std::marker::PhantomData;

/// Typed query builder for `OData` queries.
pub struct QueryBuilder<S: Schema> {
    filter: Option<Expr>,
    order: Vec<OrderKey>,
    select: Option<Vec<&'static str>>,
    expand: Option<Vec<&'static str>>,
    top: Option<u64>,
    skip: Option<u64>,
    count: bool,
    search: Option<String>,
    _phantom: PhantomData<S>,
}

impl<S: Schema> QueryBuilder<S> {
    /// Create a new empty query builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            filter: None,
            order: Vec::new(),
            select: None,
            expand: None,
            top: None,
            skip: None,
            count: false,
            search: None,
            _phantom: PhantomData,
        }
    }

    /// Set the filter expression. A second call replaces the first.
    #[must_use]
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(expr);
        self
    }

    /// Add an order-by clause.
    ///
    /// Can be called multiple times to add multiple sort keys.
    #[must_use]
    pub fn order_by<F>(mut self, field: F, dir: SortDir) -> Self
    where
        F: AsFieldName,
    {
        self.order.push(OrderKey {
            field: field.as_field_name().to_owned(),
            dir,
        });
        self
    }

    /// Set the projected fields (`$select`).
    #[must_use]
    pub fn select<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsFieldName,
    {
        self.select = Some(fields.into_iter().map(|f| f.as_field_name()).collect());
        self
    }

    /// Set the navigation properties to expand (`$expand`).
    #[must_use]
    pub fn expand<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsFieldName,
    {
        self.expand = Some(fields.into_iter().map(|f| f.as_field_name()).collect());
        self
    }

    /// Limit the number of returned entities (`$top`).
    #[must_use]
    pub fn top(mut self, top: u64) -> Self {
        self.top = Some(top);
        self
    }

    /// Skip the first `skip` entities (`$skip`).
    #[must_use]
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Ask the server to report the total count (`$count=true`).
    #[must_use]
    pub fn count(mut self, count: bool) -> Self {
        self.count = count;
        self
    }

    /// Free-text search (`$search`).
    #[must_use]
    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    /// Build the final `ODataQuery`.
    pub fn build(self) -> ODataQuery {
        let mut query = ODataQuery::new().with_count(self.count);

        if let Some(expr) = self.filter {
            query = query.with_filter(expr);
        }

        if !self.order.is_empty() {
            query = query.with_order(ODataOrderBy(self.order));
        }

        if let Some(fields) = self.select {
            query = query.with_select(fields.into_iter().map(str::to_owned).collect());
        }

        if let Some(fields) = self.expand {
            query = query.with_expand(fields.into_iter().map(str::to_owned).collect());
        }

        if let Some(top) = self.top {
            query = query.with_top(top);
        }

        if let Some(skip) = self.skip {
            query = query.with_skip(skip);
        }

        if let Some(search) = self.search {
            query = query.with_search(search);
        }

        query
    }
}

impl<S: Schema> Default for QueryBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}
