use std::cmp::Ordering;

use ordered_float::OrderedFloat;
use quarry_request::SortOrder;

fn compare(a: Option<f64>, b: Option<f64>, order: SortOrder) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            let ordering = OrderedFloat(a).cmp(&OrderedFloat(b));
            match order {
                SortOrder::Descending => ordering.reverse(),
                SortOrder::Ascending => ordering,
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Orders `items` by `sort_value` and keeps the first `top_n`.
///
/// The sort is stable, so equal values keep their input order, and items
/// without a value come last in either order.
pub fn rank_and_truncate<T, F>(
    mut items: Vec<T>,
    sort_value: F,
    order: SortOrder,
    top_n: usize,
) -> Vec<T>
where
    F: Fn(&T) -> Option<f64>,
{
    items.sort_by(|a, b| compare(sort_value(a), sort_value(b), order));
    items.truncate(top_n);
    items
}
