//! Analytics aggregation

use super::{
    AnalyticsContext, AnalyticsQuery, AnalyticsReport, CategoryBreakdown, DailyRevenue,
    OrderSourceBreakdown, PaymentMethodBreakdown, PopularItem,
};
use crate::utils::money::{to_decimal, to_f64};
use crate::utils::time;
use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use shared::models::{MenuItem, Order, OrderStatus};
use std::collections::HashMap;
use std::hash::Hash;

/// Default window when no range is given
const DEFAULT_WINDOW_DAYS: u64 = 7;
/// Most daily buckets returned for an explicit range
const MAX_DAILY_BUCKETS: i64 = 30;

const UNCATEGORIZED: &str = "Other";

/// Accumulators kept in first-seen order so a stable sort breaks ties by it
struct Grouped<K, V> {
    index: HashMap<K, usize>,
    entries: Vec<(K, V)>,
}

impl<K: Hash + Eq + Clone, V: Default> Grouped<K, V> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    fn entry(&mut self, key: K) -> &mut V {
        let idx = *self.index.entry(key.clone()).or_insert_with(|| {
            self.entries.push((key, V::default()));
            self.entries.len() - 1
        });
        &mut self.entries[idx].1
    }

    fn into_entries(self) -> Vec<(K, V)> {
        self.entries
    }
}

#[derive(Default)]
struct ItemAcc {
    name: String,
    quantity: u64,
    revenue: Decimal,
}

#[derive(Default)]
struct CountAcc {
    count: u64,
    revenue: Decimal,
}

pub fn compute_analytics(
    orders: &[Order],
    menu_items: &[MenuItem],
    query: &AnalyticsQuery,
    ctx: &AnalyticsContext,
) -> AnalyticsReport {
    let bounds = query.date_range.map(|range| range.bounds_millis(ctx.tz));
    let filtered: Vec<&Order> = orders
        .iter()
        .filter(|o| bounds.is_none_or(|(start, end)| o.created_at >= start && o.created_at < end))
        .filter(|o| {
            query
                .menu_item_id
                .as_deref()
                .is_none_or(|id| o.contains_menu_item(id))
        })
        .collect();
    let completed: Vec<&Order> = filtered
        .iter()
        .copied()
        .filter(|o| o.status == OrderStatus::Served)
        .collect();

    let total_revenue: Decimal = completed.iter().map(|o| to_decimal(o.total_amount)).sum();
    let average_order_value = if completed.is_empty() {
        Decimal::ZERO
    } else {
        total_revenue / Decimal::from(completed.len())
    };

    AnalyticsReport {
        total_revenue: to_f64(total_revenue),
        average_order_value: to_f64(average_order_value),
        total_orders: filtered.len() as u64,
        completed_orders: completed.len() as u64,
        pending_orders: filtered.iter().filter(|o| o.status.is_active()).count() as u64,
        popular_items: popular_items(&completed),
        daily_revenue: daily_revenue(&completed, query, ctx),
        category_breakdown: category_breakdown(&completed, menu_items),
        payment_method_breakdown: payment_method_breakdown(&completed),
        order_source_breakdown: order_source_breakdown(&completed),
    }
}

fn line_revenue(price: f64, quantity: u32) -> Decimal {
    to_decimal(price) * Decimal::from(quantity)
}

fn popular_items(completed: &[&Order]) -> Vec<PopularItem> {
    let mut items: Grouped<&str, ItemAcc> = Grouped::new();
    for item in completed.iter().flat_map(|o| &o.items) {
        let acc = items.entry(item.menu_item_id.as_str());
        if acc.name.is_empty() {
            acc.name = item.name.clone();
        }
        acc.quantity += u64::from(item.quantity);
        acc.revenue += line_revenue(item.price, item.quantity);
    }

    let mut ranked = items.into_entries();
    ranked.sort_by(|a, b| b.1.quantity.cmp(&a.1.quantity));
    ranked
        .into_iter()
        .map(|(id, acc)| PopularItem {
            menu_item_id: id.to_string(),
            name: acc.name,
            quantity: acc.quantity,
            revenue: to_f64(acc.revenue),
        })
        .collect()
}

/// Calendar days that get a bucket
fn bucket_days(query: &AnalyticsQuery, ctx: &AnalyticsContext) -> Vec<NaiveDate> {
    match query.date_range {
        None => {
            let today = time::local_date(ctx.now_millis, ctx.tz);
            (0..DEFAULT_WINDOW_DAYS)
                .rev()
                .filter_map(|back| today.checked_sub_days(Days::new(back)))
                .collect()
        }
        Some(range) => {
            // 超过上限时保留最近的 30 天
            let first = if range.days() > MAX_DAILY_BUCKETS {
                range
                    .end
                    .checked_sub_days(Days::new(MAX_DAILY_BUCKETS as u64 - 1))
                    .unwrap_or(range.start)
            } else {
                range.start
            };
            first.iter_days().take_while(|day| *day <= range.end).collect()
        }
    }
}

fn daily_revenue(
    completed: &[&Order],
    query: &AnalyticsQuery,
    ctx: &AnalyticsContext,
) -> Vec<DailyRevenue> {
    let days = bucket_days(query, ctx);
    let mut buckets: HashMap<NaiveDate, CountAcc> =
        days.iter().map(|day| (*day, CountAcc::default())).collect();

    for order in completed {
        let day = time::local_date(order.created_at, ctx.tz);
        if let Some(acc) = buckets.get_mut(&day) {
            acc.count += 1;
            acc.revenue += to_decimal(order.total_amount);
        }
    }

    days.into_iter()
        .map(|day| {
            let acc = buckets.remove(&day).unwrap_or_default();
            DailyRevenue {
                date: day.format("%Y-%m-%d").to_string(),
                label: day.format("%b %-d").to_string(),
                revenue: to_f64(acc.revenue),
                orders: acc.count,
            }
        })
        .collect()
}

fn category_breakdown(completed: &[&Order], menu_items: &[MenuItem]) -> Vec<CategoryBreakdown> {
    let categories: HashMap<&str, &str> = menu_items
        .iter()
        .filter_map(|m| {
            m.category
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(|c| (m.id.as_str(), c))
        })
        .collect();

    let mut groups: Grouped<&str, ItemAcc> = Grouped::new();
    for item in completed.iter().flat_map(|o| &o.items) {
        let category = categories
            .get(item.menu_item_id.as_str())
            .copied()
            .unwrap_or(UNCATEGORIZED);
        let acc = groups.entry(category);
        acc.quantity += u64::from(item.quantity);
        acc.revenue += line_revenue(item.price, item.quantity);
    }

    let mut ranked = groups.into_entries();
    ranked.sort_by(|a, b| b.1.revenue.cmp(&a.1.revenue));
    ranked
        .into_iter()
        .map(|(category, acc)| CategoryBreakdown {
            category: category.to_string(),
            revenue: to_f64(acc.revenue),
            quantity: acc.quantity,
        })
        .collect()
}

fn count_by<K: Hash + Eq + Clone>(
    completed: &[&Order],
    key: impl Fn(&Order) -> K,
) -> Vec<(K, CountAcc)> {
    let mut groups: Grouped<K, CountAcc> = Grouped::new();
    for order in completed {
        let acc = groups.entry(key(order));
        acc.count += 1;
        acc.revenue += to_decimal(order.total_amount);
    }
    let mut ranked = groups.into_entries();
    ranked.sort_by(|a, b| b.1.revenue.cmp(&a.1.revenue));
    ranked
}

fn payment_method_breakdown(completed: &[&Order]) -> Vec<PaymentMethodBreakdown> {
    count_by(completed, |o| o.payment_method.unwrap_or_default().as_str())
        .into_iter()
        .map(|(method, acc)| PaymentMethodBreakdown {
            method: method.to_string(),
            count: acc.count,
            revenue: to_f64(acc.revenue),
        })
        .collect()
}

fn order_source_breakdown(completed: &[&Order]) -> Vec<OrderSourceBreakdown> {
    count_by(completed, |o| o.order_source.as_str())
        .into_iter()
        .map(|(source, acc)| OrderSourceBreakdown {
            source: source.to_string(),
            count: acc.count,
            revenue: to_f64(acc.revenue),
        })
        .collect()
}
