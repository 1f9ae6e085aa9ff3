//! Generated criteria for cross-backend equivalence checks.
//!
//! Every filter value parses as the declared kind of its field. That
//! includes bare dates on timestamp fields, text that looks like a number,
//! and substring tests on numbers, which match the number's JSON text.

use tessera_core::criteria::{Criteria, Filter, FilterOperator, Order, Pagination};

fn candidate_filters() -> Vec<Filter> {
    [
        ("status", FilterOperator::Equal, "active"),
        ("status", FilterOperator::NotEqual, "pending"),
        ("category", FilterOperator::Contains, "Oo"),
        ("category", FilterOperator::NotContains, "KIT"),
        ("value", FilterOperator::Gt, "25"),
        ("value", FilterOperator::Lt, "70"),
        ("score", FilterOperator::Gt, "2.5"),
        ("score", FilterOperator::NotEqual, "3"),
        ("createdAt", FilterOperator::Lt, "2026-01-07T00:00:00Z"),
        ("name", FilterOperator::Equal, "Item 10"),
        ("name", FilterOperator::Gt, "Item 5"),
        ("value", FilterOperator::Contains, "00"),
        ("createdAt", FilterOperator::Gt, "2026-01-04"),
        ("status", FilterOperator::NotEqual, "30"),
    ]
    .into_iter()
    .filter_map(|(field, op, value)| Filter::new(field, op, value).ok())
    .collect()
}

fn filter_sets() -> Vec<Vec<Filter>> {
    let singles = candidate_filters();
    let mut sets = vec![vec![]];
    for (i, first) in singles.iter().enumerate() {
        sets.push(vec![first.clone()]);
        for second in &singles[i + 1..] {
            sets.push(vec![first.clone(), second.clone()]);
        }
    }
    sets
}

fn orders() -> Vec<Order> {
    vec![
        Order::none(),
        Order::asc("value"),
        Order::desc("value"),
        Order::asc("score"),
        Order::desc("score"),
        Order::asc("createdAt"),
        Order::desc("name"),
        Order::asc("category"),
    ]
}

fn paginations(order: &Order) -> Vec<Option<Pagination>> {
    let mut all = vec![
        None,
        Some(Pagination::offset(3, 2)),
        Some(Pagination::offset(0, 0)),
        Some(Pagination::offset(4, 9)),
    ];
    if order.has_order() {
        all.push(Some(Pagination::first_page(4)));
    }
    all
}

/// Every combination of up to two sample filters, eight orders and the
/// pagination modes valid for each order, over
/// [`SampleRecord`](crate::SampleRecord) fields.
#[must_use]
pub fn generated_criteria() -> Vec<Criteria> {
    let mut all = Vec::new();
    for filters in filter_sets() {
        for order in orders() {
            for pagination in paginations(&order) {
                if let Ok(criteria) = Criteria::new(filters.clone().into(), order.clone(), pagination) {
                    all.push(criteria);
                }
            }
        }
    }
    all
}
