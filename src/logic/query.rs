use std::cmp::Ordering;

use itertools::Itertools;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::logic::filter::{parse_filter, FilterExpr, QueryError};

/// Hard server-side cap on page size. Requests above it are clamped, not
/// rejected.
pub const MAX_PAGE_SIZE: usize = 100;

/// A serialized entity as seen by the query pipeline: its JSON field map.
pub type Record = Map<String, Value>;

/// Raw query-string parameters for collection endpoints. Both the
/// `$`-prefixed OData spellings and the bare names are accepted.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct QueryParams {
    #[serde(rename = "$filter", alias = "filter")]
    pub filter: Option<String>,
    #[serde(rename = "$orderby", alias = "orderby")]
    pub orderby: Option<String>,
    #[serde(rename = "$select", alias = "select")]
    pub select: Option<String>,
    #[serde(rename = "$expand", alias = "expand")]
    pub expand: Option<String>,
    #[serde(rename = "$top", alias = "top")]
    pub top: Option<String>,
    #[serde(rename = "$skip", alias = "skip")]
    pub skip: Option<String>,
    #[serde(rename = "$count", alias = "count")]
    pub count: Option<String>,
}

/// One `$orderby` key: field name plus direction.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderKey {
    pub field: String,
    pub descending: bool,
}

/// Parsed and validated query options.
#[derive(Debug, Default, Clone)]
pub struct QueryOptions {
    pub filter: Option<FilterExpr>,
    pub order: Vec<OrderKey>,
    pub select: Vec<String>,
    pub expand: Vec<String>,
    pub top: Option<usize>,
    pub skip: usize,
    pub count: bool,
}

/// Result of running a query: the page of records plus the post-filter
/// total when `$count=true` was requested.
#[derive(Debug)]
pub struct QueryOutcome {
    pub items: Vec<Record>,
    pub total: Option<usize>,
}

impl QueryOptions {
    pub fn from_params(params: &QueryParams) -> Result<Self, QueryError> {
        let filter = match non_empty(&params.filter) {
            Some(raw) => Some(parse_filter(raw)?),
            None => None,
        };

        let order = match non_empty(&params.orderby) {
            Some(raw) => parse_orderby(raw)?,
            None => Vec::new(),
        };

        let select = match non_empty(&params.select) {
            Some(raw) => parse_field_list(raw, "$select")?,
            None => Vec::new(),
        };

        let expand = match non_empty(&params.expand) {
            Some(raw) => parse_field_list(raw, "$expand")?,
            None => Vec::new(),
        };

        let top = match non_empty(&params.top) {
            Some(raw) => Some(parse_usize(raw, "$top")?),
            None => None,
        };

        let skip = match non_empty(&params.skip) {
            Some(raw) => parse_usize(raw, "$skip")?,
            None => 0,
        };

        let count = match non_empty(&params.count) {
            Some("true") => true,
            Some("false") | None => false,
            Some(other) => {
                return Err(QueryError::malformed(format!(
                    "invalid $count value '{}', expected true or false",
                    other
                )));
            }
        };

        Ok(Self {
            filter,
            order,
            select,
            expand,
            top,
            skip,
            count,
        })
    }
}

/// Run the query pipeline over a collection: filter, stable sort, count,
/// paginate, then project. Projection comes last so filter and sort may
/// reference unselected fields. `relations` names the expandable relations
/// of the entity; an unknown `$expand` target is a client error.
///
/// Field names in `$filter`, `$orderby` and `$select` are deliberately not
/// validated against a schema: the pipeline only sees each record's field
/// map, and an unknown field behaves as absent (filters to false, sorts
/// first, projects to nothing). `$expand` is the exception because the
/// relation set per entity is fixed and known to the caller.
pub fn apply_query(
    records: Vec<Record>,
    options: &QueryOptions,
    relations: &[&str],
) -> Result<QueryOutcome, QueryError> {
    validate_expand(options, relations)?;

    let filtered: Vec<Record> = match &options.filter {
        Some(filter) => records.into_iter().filter(|r| filter.matches(r)).collect(),
        None => records,
    };

    let total = filtered.len();

    let sorted: Vec<Record> = if options.order.is_empty() {
        filtered
    } else {
        // itertools::sorted_by is a stable sort, so ties keep input order
        filtered
            .into_iter()
            .sorted_by(|a, b| compare_records(a, b, &options.order))
            .collect()
    };

    let limit = options.top.map(|top| top.min(MAX_PAGE_SIZE));
    let paged = sorted
        .into_iter()
        .skip(options.skip)
        .take(limit.unwrap_or(usize::MAX));

    let items = paged.map(|record| project(record, &options.select)).collect();

    Ok(QueryOutcome {
        items,
        total: options.count.then_some(total),
    })
}

/// Apply the single-entity subset of the options (expand validation and
/// projection) to one record, for GET-by-id endpoints.
pub fn apply_to_single(
    record: Record,
    options: &QueryOptions,
    relations: &[&str],
) -> Result<Record, QueryError> {
    validate_expand(options, relations)?;
    Ok(project(record, &options.select))
}

fn validate_expand(options: &QueryOptions, relations: &[&str]) -> Result<(), QueryError> {
    for name in &options.expand {
        if !relations.contains(&name.as_str()) {
            return Err(QueryError::malformed(format!(
                "unknown $expand target '{}'",
                name
            )));
        }
    }
    Ok(())
}

fn project(record: Record, select: &[String]) -> Record {
    if select.is_empty() {
        return record;
    }
    let mut projected = Record::new();
    for field in select {
        if let Some(value) = record.get(field) {
            projected.insert(field.clone(), value.clone());
        }
    }
    projected
}

fn compare_records(a: &Record, b: &Record, keys: &[OrderKey]) -> Ordering {
    for key in keys {
        let ordering = order_values(a.get(&key.field), b.get(&key.field));
        let ordering = if key.descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Total order over JSON values for sorting: missing/null first, then
/// booleans, numbers, strings, and everything else.
fn order_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            _ => 4,
        }
    }

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => {
            let by_rank = rank(a).cmp(&rank(b));
            if by_rank != Ordering::Equal {
                return by_rank;
            }
            match (a, b) {
                (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
                (Value::Number(x), Value::Number(y)) => x
                    .as_f64()
                    .partial_cmp(&y.as_f64())
                    .unwrap_or(Ordering::Equal),
                (Value::String(x), Value::String(y)) => x.cmp(y),
                _ => Ordering::Equal,
            }
        }
    }
}

fn non_empty(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_orderby(raw: &str) -> Result<Vec<OrderKey>, QueryError> {
    raw.split(',')
        .map(|clause| {
            let mut parts = clause.split_whitespace();
            let field = match parts.next() {
                Some(field) if is_identifier(field) => field.to_string(),
                _ => {
                    return Err(QueryError::malformed(format!(
                        "invalid $orderby clause '{}'",
                        clause.trim()
                    )));
                }
            };
            let descending = match parts.next() {
                None => false,
                Some("asc") => false,
                Some("desc") => true,
                Some(other) => {
                    return Err(QueryError::malformed(format!(
                        "invalid $orderby direction '{}'",
                        other
                    )));
                }
            };
            if parts.next().is_some() {
                return Err(QueryError::malformed(format!(
                    "invalid $orderby clause '{}'",
                    clause.trim()
                )));
            }
            Ok(OrderKey { field, descending })
        })
        .collect()
}

fn parse_field_list(raw: &str, param: &str) -> Result<Vec<String>, QueryError> {
    raw.split(',')
        .map(|field| {
            let field = field.trim();
            if is_identifier(field) {
                Ok(field.to_string())
            } else {
                Err(QueryError::malformed(format!(
                    "invalid {} entry '{}'",
                    param, field
                )))
            }
        })
        .collect()
}

fn parse_usize(raw: &str, param: &str) -> Result<usize, QueryError> {
    raw.parse()
        .map_err(|_| QueryError::malformed(format!("invalid {} value '{}'", param, raw)))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
