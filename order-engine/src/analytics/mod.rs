//! Order analytics
//!
//! Pure aggregation over a snapshot of orders and menu items. Nothing here
//! reads the store or the wall clock; "now" and the business timezone come
//! in through [`AnalyticsContext`].

pub mod aggregator;

pub use aggregator::compute_analytics;

use crate::utils::time;
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use shared::AppResult;

// ============================================================================
// Inputs
// ============================================================================

/// Inclusive range of local calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> AppResult<Self> {
        if start > end {
            return Err(shared::AppError::validation(format!(
                "Date range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse `YYYY-MM-DD` bounds
    pub fn parse(start: &str, end: &str) -> AppResult<Self> {
        Self::new(time::parse_date(start)?, time::parse_date(end)?)
    }

    /// `[start_millis, end_millis)` covering every day of the range
    pub fn bounds_millis(&self, tz: Tz) -> (i64, i64) {
        (
            time::day_start_millis(self.start, tz),
            time::day_end_millis(self.end, tz),
        )
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnalyticsQuery {
    pub date_range: Option<DateRange>,
    /// Only orders containing this menu item
    pub menu_item_id: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct AnalyticsContext {
    pub now_millis: i64,
    pub tz: Tz,
}

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopularItem {
    pub menu_item_id: String,
    pub name: String,
    pub quantity: u64,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRevenue {
    /// "2026-10-16"
    pub date: String,
    /// "Oct 16"
    pub label: String,
    pub revenue: f64,
    pub orders: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBreakdown {
    pub category: String,
    pub revenue: f64,
    pub quantity: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodBreakdown {
    pub method: String,
    pub count: u64,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSourceBreakdown {
    pub source: String,
    pub count: u64,
    pub revenue: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub total_revenue: f64,
    pub average_order_value: f64,
    pub total_orders: u64,
    pub completed_orders: u64,
    pub pending_orders: u64,
    pub popular_items: Vec<PopularItem>,
    pub daily_revenue: Vec<DailyRevenue>,
    pub category_breakdown: Vec<CategoryBreakdown>,
    pub payment_method_breakdown: Vec<PaymentMethodBreakdown>,
    pub order_source_breakdown: Vec<OrderSourceBreakdown>,
}
