//! Paging and sorting for list queries
//!
//! Sorting works on the JSON shape of an entity, so any field (including
//! nested ones such as `data.age`) can be a sort key.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::ResponseStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// One page of a sorted list; `page` is 1-based
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
    pub sort_by: String,
    pub direction: SortDirection,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
            sort_by: "updatedAt".to_string(),
            direction: SortDirection::Desc,
        }
    }
}

impl PageRequest {
    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            page,
            page_size,
            ..Default::default()
        }
    }

    pub fn sorted_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort_by = field.into();
        self.direction = direction;
        self
    }

    fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }
}

/// Response list filter plus paging
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseQuery {
    pub template_id: Option<i64>,
    pub status: Option<ResponseStatus>,
    pub page: PageRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub total_pages: usize,
    pub current_page: usize,
}

impl<T: Serialize> Page<T> {
    /// Sort the full result set and cut out the requested page
    pub fn build(items: Vec<T>, request: &PageRequest) -> Self {
        let total = items.len();
        let total_pages = if request.page_size == 0 {
            0
        } else {
            total.div_ceil(request.page_size)
        };

        let sorted = sort_by_field(items, &request.sort_by, request.direction);
        let items = sorted
            .into_iter()
            .skip(request.offset())
            .take(request.page_size)
            .collect();

        Self {
            items,
            total,
            total_pages,
            current_page: request.page,
        }
    }
}

/// Stable sort by a (dotted) JSON field
///
/// Missing, null and mismatched values compare as equal to everything, which
/// is not a total order, so this uses an insertion sort that never relies on
/// transitivity.
pub fn sort_by_field<T: Serialize>(items: Vec<T>, field: &str, direction: SortDirection) -> Vec<T> {
    let mut keyed: Vec<(Option<Value>, T)> = items
        .into_iter()
        .map(|item| {
            let key = serde_json::to_value(&item)
                .ok()
                .and_then(|v| lookup(&v, field).cloned());
            (key, item)
        })
        .collect();

    for i in 1..keyed.len() {
        let mut j = i;
        while j > 0 {
            let ord = compare(keyed[j - 1].0.as_ref(), keyed[j].0.as_ref());
            let ord = match direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Greater {
                break;
            }
            keyed.swap(j - 1, j);
            j -= 1;
        }
    }

    keyed.into_iter().map(|(_, item)| item).collect()
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, key| current.get(key))
}

/// Null-safe comparison; incomparable pairs are `Equal`
fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sort_ascending_and_descending() {
        let items = vec![json!({"n": 2}), json!({"n": 1}), json!({"n": 3})];
        let asc = sort_by_field(items.clone(), "n", SortDirection::Asc);
        assert_eq!(asc, vec![json!({"n": 1}), json!({"n": 2}), json!({"n": 3})]);

        let desc = sort_by_field(items, "n", SortDirection::Desc);
        assert_eq!(desc, vec![json!({"n": 3}), json!({"n": 2}), json!({"n": 1})]);
    }

    #[test]
    fn test_sort_keeps_missing_values_in_place() {
        let items = vec![json!({"n": 2}), json!({"x": 0}), json!({"n": 1})];
        let sorted = sort_by_field(items, "n", SortDirection::Asc);
        // The middle item compares equal to both neighbours, so nothing moves
        assert_eq!(sorted, vec![json!({"n": 2}), json!({"x": 0}), json!({"n": 1})]);
    }

    #[test]
    fn test_sort_by_nested_field() {
        let items = vec![json!({"data": {"age": 40}}), json!({"data": {"age": 30}})];
        let sorted = sort_by_field(items, "data.age", SortDirection::Asc);
        assert_eq!(sorted[0], json!({"data": {"age": 30}}));
    }

    #[test]
    fn test_page_build() {
        let items: Vec<Value> = (1..=25).map(|n| json!({"n": n})).collect();
        let request = PageRequest::new(3, 10).sorted_by("n", SortDirection::Asc);
        let page = Page::build(items, &request);

        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.current_page, 3);
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.items[0], json!({"n": 21}));
    }

    #[test]
    fn test_page_past_the_end_is_empty() {
        let items = vec![json!({"n": 1})];
        let page = Page::build(items, &PageRequest::new(5, 10));
        assert!(page.items.is_empty());
        assert_eq!(page.total, 1);
    }
}
