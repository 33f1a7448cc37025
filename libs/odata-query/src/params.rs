//! Flattening of query descriptions into request parameters.

use crate::ODataQuery;
use std::collections::BTreeMap;

/// A query description that can be flattened into HTTP request parameters.
///
/// This is the contract the entity service relies on: it never looks inside a
/// query, it only asks for the resulting `$`-parameters.
pub trait QueryParams {
    /// Parameter name to value mapping, e.g. `{"$top": "10"}`.
    fn to_parameter_mapping(&self) -> BTreeMap<String, String>;

    /// Form-url-encoded query string without the leading `?`.
    fn to_query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.to_parameter_mapping())
            .finish()
    }
}

impl QueryParams for ODataQuery {
    fn to_parameter_mapping(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();

        if let Some(filter) = self.filter() {
            params.insert("$filter".to_owned(), filter.to_string());
        }
        if !self.order.is_empty() {
            params.insert("$orderby".to_owned(), self.order.to_string());
        }
        if let Some(select) = &self.select {
            params.insert("$select".to_owned(), select.join(","));
        }
        if let Some(expand) = &self.expand {
            params.insert("$expand".to_owned(), expand.join(","));
        }
        if let Some(top) = self.top {
            params.insert("$top".to_owned(), top.to_string());
        }
        if let Some(skip) = self.skip {
            params.insert("$skip".to_owned(), skip.to_string());
        }
        if self.count {
            params.insert("$count".to_owned(), "true".to_owned());
        }
        if let Some(search) = &self.search {
            params.insert("$search".to_owned(), search.clone());
        }

        params
    }
}

/// A raw parameter map passes through untouched.
impl QueryParams for BTreeMap<String, String> {
    fn to_parameter_mapping(&self) -> BTreeMap<String, String> {
        self.clone()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::ast::{CompareOperator, Expr, Value};
    use crate::{ODataOrderBy, OrderKey, SortDir};

    #[test]
    fn test_empty_query_has_no_params() {
        let query = ODataQuery::new();
        assert!(query.to_parameter_mapping().is_empty());
        assert_eq!(query.to_query_string(), "");
    }

    #[test]
    fn test_all_options_are_mapped() {
        let query = ODataQuery::new()
            .with_filter(Expr::Compare(
                Box::new(Expr::Identifier("Price".to_owned())),
                CompareOperator::Gt,
                Box::new(Expr::Value(Value::Number(5.into()))),
            ))
            .with_order(ODataOrderBy(vec![OrderKey {
                field: "Name".to_owned(),
                dir: SortDir::Desc,
            }]))
            .with_select(vec!["Id".to_owned(), "Name".to_owned()])
            .with_expand(vec!["Category".to_owned()])
            .with_top(10)
            .with_skip(20)
            .with_count(true)
            .with_search("milk");

        let params = query.to_parameter_mapping();
        assert_eq!(params["$filter"], "Price gt 5");
        assert_eq!(params["$orderby"], "Name desc");
        assert_eq!(params["$select"], "Id,Name");
        assert_eq!(params["$expand"], "Category");
        assert_eq!(params["$top"], "10");
        assert_eq!(params["$skip"], "20");
        assert_eq!(params["$count"], "true");
        assert_eq!(params["$search"], "milk");
        assert_eq!(params.len(), 8);
    }

    #[test]
    fn test_query_string_is_form_encoded() {
        let query = ODataQuery::new()
            .with_top(3)
            .with_filter(Expr::Compare(
                Box::new(Expr::Identifier("Name".to_owned())),
                CompareOperator::Eq,
                Box::new(Expr::Value(Value::String("a b".to_owned()))),
            ));

        assert_eq!(
            query.to_query_string(),
            "%24filter=Name+eq+%27a+b%27&%24top=3"
        );
    }

    #[test]
    fn test_raw_map_passes_through() {
        let mut raw = BTreeMap::new();
        raw.insert("$top".to_owned(), "1".to_owned());
        assert_eq!(raw.to_parameter_mapping(), raw);
        assert_eq!(raw.to_query_string(), "%24top=1");
    }
}
