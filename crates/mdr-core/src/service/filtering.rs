//! Paginated listing over projected fields
//!
//! Filters and sort keys address fields of the serialized projection by
//! name; dotted paths (`library.name`) descend into nested objects.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use crate::errors::{ExError, MdrError};
use crate::model::LibraryItemStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Eq,
    Ne,
    Contains,
    StartsWith,
    Gt,
    Lt,
}

/// A single predicate on a projected field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterClause {
    pub field: String,
    pub op: FilterOperator,
    pub value: Value,
}

impl FilterClause {
    pub fn new(field: impl Into<String>, op: FilterOperator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterJoin {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    #[serde(default = "default_ascending")]
    pub ascending: bool,
}

fn default_ascending() -> bool {
    true
}

/// Listing request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<LibraryItemStatus>,
    #[serde(default)]
    pub library_name: Option<String>,
    #[serde(default)]
    pub filters: Vec<FilterClause>,
    #[serde(default)]
    pub join: FilterJoin,
    #[serde(default)]
    pub sort: Vec<SortKey>,
    /// 1-based page number
    #[serde(default = "default_page_number")]
    pub page_number: u32,
    /// 0 returns every matching item; None uses the configured default
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub total_count: bool,
}

fn default_page_number() -> u32 {
    1
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            status: None,
            library_name: None,
            filters: Vec::new(),
            join: FilterJoin::And,
            sort: Vec::new(),
            page_number: 1,
            page_size: None,
            total_count: false,
        }
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: Option<usize>,
    pub page_number: u32,
    pub page_size: u32,
}

/// Page-size bounds applied to listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 1000,
        }
    }
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| current.get(segment))
}

/// `major.minor` version text such as `"0.10"`
fn parse_version(text: &str) -> Option<(u64, u64)> {
    let (major, minor) = text.split_once('.')?;
    let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    if !digits(major) || !digits(minor) {
        return None;
    }
    Some((major.parse().ok()?, minor.parse().ok()?))
}

fn parse_instant(text: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(text).ok()
}

/// Versions compare numerically and RFC 3339 timestamps as instants;
/// anything else falls back to text order
fn compare_strings(a: &str, b: &str) -> Ordering {
    if let (Some(x), Some(y)) = (parse_version(a), parse_version(b)) {
        return x.cmp(&y);
    }
    if let (Some(x), Some(y)) = (parse_instant(a), parse_instant(b)) {
        return x.cmp(&y);
    }
    a.cmp(b)
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => compare_strings(x, y),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_lowercase(),
        other => other.to_string().to_lowercase(),
    }
}

fn matches_scalar(op: FilterOperator, field: &Value, wanted: &Value) -> bool {
    match op {
        FilterOperator::Eq => field == wanted,
        FilterOperator::Ne => field != wanted,
        FilterOperator::Contains => as_text(field).contains(&as_text(wanted)),
        FilterOperator::StartsWith => as_text(field).starts_with(&as_text(wanted)),
        FilterOperator::Gt => {
            !field.is_null() && compare_values(field, wanted) == Ordering::Greater
        }
        FilterOperator::Lt => !field.is_null() && compare_values(field, wanted) == Ordering::Less,
    }
}

impl FilterClause {
    /// Evaluate against one projected item; array fields match if any element does
    pub fn matches(&self, item: &Value) -> bool {
        let field = lookup(item, &self.field).unwrap_or(&Value::Null);
        match (field, self.op) {
            (Value::Array(elements), FilterOperator::Ne) => elements
                .iter()
                .all(|e| matches_scalar(FilterOperator::Ne, e, &self.value)),
            (Value::Array(elements), op) => {
                elements.iter().any(|e| matches_scalar(op, e, &self.value))
            }
            (field, op) => matches_scalar(op, field, &self.value),
        }
    }
}

fn matches_query(query: &ListQuery, item: &Value) -> bool {
    if query.filters.is_empty() {
        return true;
    }
    match query.join {
        FilterJoin::And => query.filters.iter().all(|f| f.matches(item)),
        FilterJoin::Or => query.filters.iter().any(|f| f.matches(item)),
    }
}

fn compare_by_keys(keys: &[SortKey], a: &Value, b: &Value) -> Ordering {
    for key in keys {
        let left = lookup(a, &key.field).unwrap_or(&Value::Null);
        let right = lookup(b, &key.field).unwrap_or(&Value::Null);
        let ordering = compare_values(left, right);
        let ordering = if key.ascending {
            ordering
        } else {
            ordering.reverse()
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Filter, sort and paginate projected items
///
/// # Errors
///
/// `Validation` for a page number below 1 or a page size above the limit.
pub fn filter_sort_paginate<T: Serialize>(
    items: Vec<T>,
    query: &ListQuery,
    limits: PageLimits,
) -> Result<Page<T>, ExError> {
    if query.page_number < 1 {
        return Err(MdrError::validation("page_number must be >= 1").into());
    }
    let page_size = query.page_size.unwrap_or(limits.default_page_size);
    if page_size > limits.max_page_size {
        return Err(MdrError::validation(format!(
            "page_size must be <= {}",
            limits.max_page_size
        ))
        .into());
    }

    let mut projected = Vec::with_capacity(items.len());
    for item in items {
        let value = serde_json::to_value(&item)?;
        if matches_query(query, &value) {
            projected.push((value, item));
        }
    }
    projected.sort_by(|(a, _), (b, _)| compare_by_keys(&query.sort, a, b));

    let total = projected.len();
    let selected: Vec<T> = if page_size == 0 {
        projected.into_iter().map(|(_, item)| item).collect()
    } else {
        let skip = (query.page_number as usize - 1) * page_size as usize;
        projected
            .into_iter()
            .skip(skip)
            .take(page_size as usize)
            .map(|(_, item)| item)
            .collect()
    };

    Ok(Page {
        items: selected,
        total_count: query.total_count.then_some(total),
        page_number: query.page_number,
        page_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Vec<Value> {
        vec![
            json!({"uid": "A_1", "name": "Alpha", "order": 3, "library": {"name": "Sponsor"}}),
            json!({"uid": "A_2", "name": "beta", "order": 1, "library": {"name": "CDISC"}}),
            json!({"uid": "A_3", "name": "Gamma", "order": 2, "library": {"name": "Sponsor"}}),
        ]
    }

    fn uids(page: &Page<Value>) -> Vec<&str> {
        page.items
            .iter()
            .filter_map(|v| v["uid"].as_str())
            .collect()
    }

    #[test]
    fn test_and_filters_with_dotted_path() {
        let query = ListQuery {
            filters: vec![
                FilterClause::new("library.name", FilterOperator::Eq, "Sponsor"),
                FilterClause::new("order", FilterOperator::Gt, 2),
            ],
            page_size: Some(0),
            ..ListQuery::default()
        };
        let page = filter_sort_paginate(rows(), &query, PageLimits::default()).unwrap();
        assert_eq!(uids(&page), vec!["A_1"]);
    }

    #[test]
    fn test_or_filters_do_not_duplicate() {
        let query = ListQuery {
            filters: vec![
                FilterClause::new("name", FilterOperator::StartsWith, "a"),
                FilterClause::new("library.name", FilterOperator::Eq, "Sponsor"),
            ],
            join: FilterJoin::Or,
            page_size: Some(0),
            ..ListQuery::default()
        };
        let page = filter_sort_paginate(rows(), &query, PageLimits::default()).unwrap();
        assert_eq!(uids(&page), vec!["A_1", "A_3"]);
    }

    #[test]
    fn test_multi_key_sort_and_paging() {
        let query = ListQuery {
            sort: vec![
                SortKey {
                    field: "library.name".to_string(),
                    ascending: false,
                },
                SortKey {
                    field: "order".to_string(),
                    ascending: true,
                },
            ],
            page_number: 2,
            page_size: Some(2),
            total_count: true,
            ..ListQuery::default()
        };
        let page = filter_sort_paginate(rows(), &query, PageLimits::default()).unwrap();
        assert_eq!(uids(&page), vec!["A_2"]);
        assert_eq!(page.total_count, Some(3));
    }

    #[test]
    fn test_page_number_zero_is_rejected() {
        let query = ListQuery {
            page_number: 0,
            ..ListQuery::default()
        };
        let err = filter_sort_paginate(rows(), &query, PageLimits::default()).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ExErrorKind::Validation);
    }

    #[test]
    fn test_page_size_above_limit_is_rejected() {
        let query = ListQuery {
            page_size: Some(5000),
            ..ListQuery::default()
        };
        assert!(filter_sort_paginate(rows(), &query, PageLimits::default()).is_err());
    }

    #[test]
    fn test_contains_is_case_insensitive_and_total_optional() {
        let query = ListQuery {
            filters: vec![FilterClause::new("name", FilterOperator::Contains, "AMM")],
            ..ListQuery::default()
        };
        let page = filter_sort_paginate(rows(), &query, PageLimits::default()).unwrap();
        assert_eq!(uids(&page), vec!["A_3"]);
        assert_eq!(page.total_count, None);
    }

    #[test]
    fn test_array_field_matches_any_element() {
        let items = vec![json!({"uid": "X", "possible_actions": ["edit", "approve"]})];
        let clause = FilterClause::new("possible_actions", FilterOperator::Eq, "approve");
        assert!(clause.matches(&items[0]));
        let ne = FilterClause::new("possible_actions", FilterOperator::Ne, "approve");
        assert!(!ne.matches(&items[0]));
    }

    fn versioned() -> Vec<Value> {
        vec![
            json!({"uid": "V_1", "version": "0.9", "start_date": "2026-03-01T10:00:00.5Z"}),
            json!({"uid": "V_2", "version": "0.10", "start_date": "2026-03-01T10:00:00.123456Z"}),
            json!({"uid": "V_3", "version": "1.0", "start_date": "2026-03-01T10:00:00Z"}),
            json!({"uid": "V_4", "version": "0.2", "start_date": "2026-03-01T09:00:00+00:00"}),
        ]
    }

    #[test]
    fn test_versions_sort_by_number_not_text() {
        let query = ListQuery {
            sort: vec![SortKey {
                field: "version".to_string(),
                ascending: true,
            }],
            page_size: Some(0),
            ..ListQuery::default()
        };
        let page = filter_sort_paginate(versioned(), &query, PageLimits::default()).unwrap();
        assert_eq!(uids(&page), vec!["V_4", "V_1", "V_2", "V_3"]);
    }

    #[test]
    fn test_version_greater_than_counts_two_digit_minors() {
        let query = ListQuery {
            filters: vec![FilterClause::new("version", FilterOperator::Gt, "0.9")],
            page_size: Some(0),
            ..ListQuery::default()
        };
        let page = filter_sort_paginate(versioned(), &query, PageLimits::default()).unwrap();
        assert_eq!(uids(&page), vec!["V_2", "V_3"]);

        let below = FilterClause::new("version", FilterOperator::Lt, "0.10");
        assert!(below.matches(&versioned()[0]));
    }

    #[test]
    fn test_dates_compare_as_instants_whatever_the_fraction_digits() {
        let query = ListQuery {
            sort: vec![SortKey {
                field: "start_date".to_string(),
                ascending: true,
            }],
            page_size: Some(0),
            ..ListQuery::default()
        };
        let page = filter_sort_paginate(versioned(), &query, PageLimits::default()).unwrap();
        assert_eq!(uids(&page), vec!["V_4", "V_3", "V_2", "V_1"]);

        let after = FilterClause::new("start_date", FilterOperator::Gt, "2026-03-01T10:00:00.2Z");
        assert!(after.matches(&versioned()[0]));
        assert!(!after.matches(&versioned()[1]));
    }

    #[test]
    fn test_plain_text_still_sorts_lexically() {
        assert_eq!(compare_strings("1.2.3", "1.10"), Ordering::Greater);
        assert_eq!(compare_strings("beta", "alpha"), Ordering::Greater);
    }
}
