//! Common types used across the platform

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Pagination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

impl Pagination {
    /// Number of items to skip for this page (pages are 1-based)
    pub fn offset(&self) -> usize {
        (self.page.max(1) as usize - 1) * self.per_page as usize
    }

    /// Slice one page out of an already ordered list
    pub fn paginate<T>(&self, items: Vec<T>) -> PaginatedResponse<T> {
        let total_items = items.len() as u64;
        let per_page = self.per_page.max(1);
        let total_pages = total_items.div_ceil(per_page as u64) as u32;

        let data = items
            .into_iter()
            .skip(self.offset())
            .take(per_page as usize)
            .collect();

        PaginatedResponse {
            data,
            pagination: PaginationMeta {
                page: self.page.max(1),
                per_page,
                total_items,
                total_pages,
            },
        }
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

/// Inclusive date range for queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn contains_timestamp(&self, timestamp: DateTime<Utc>) -> bool {
        self.contains(timestamp.date_naive())
    }
}
