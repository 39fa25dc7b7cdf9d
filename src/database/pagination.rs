use url::form_urlencoded;

use crate::models::Pagination;

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;
const ORDERABLE_COLUMNS: [&str; 6] = ["id", "username", "phone", "role", "status", "created_at"];

/// Listing parameters parsed from a raw query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: i64,
    pub page_size: i64,
    pub order_by: &'static str,
    pub descending: bool,
    /// Normalized query string, used as the cache key suffix.
    pub encoded: String,
}

impl ListQuery {
    pub fn from_raw(raw: Option<&str>) -> Self {
        let mut pairs: Vec<(String, String)> = form_urlencoded::parse(raw.unwrap_or("").as_bytes())
            .into_owned()
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));

        let value = |name: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };

        let page = value("page")
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(1);
        let page_size = value("pageSize")
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|s| *s > 0)
            .map(|s| s.min(MAX_PAGE_SIZE))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let order_by = value("orderBy")
            .and_then(|v| ORDERABLE_COLUMNS.into_iter().find(|c| *c == v))
            .unwrap_or("created_at");
        let descending = value("sortBy").is_some_and(|v| v.eq_ignore_ascii_case("desc"));

        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs.iter())
            .finish();

        Self {
            page,
            page_size,
            order_by,
            descending,
            encoded,
        }
    }

    /// Saturates, so a page far past the end yields an empty result set.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn order_clause(&self) -> String {
        let direction = if self.descending { "DESC" } else { "ASC" };
        format!("{} {}, id ASC", self.order_by, direction)
    }

    pub fn paginate(&self, total_items: i64) -> Pagination {
        let total_pages = total_items.saturating_add(self.page_size - 1) / self.page_size;
        let has_next = self.offset().saturating_add(self.page_size) < total_items;
        Pagination {
            total_items,
            total_pages,
            current_page: self.page,
            next_page: if has_next { self.page.checked_add(1) } else { None },
            previous_page: (self.page > 1).then(|| self.page - 1),
            first_page: 1,
            last_page: total_pages,
        }
    }
}
