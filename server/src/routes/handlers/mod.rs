#[cfg(debug_assertions)]
pub mod dev;
pub mod meetings;
pub mod status;
pub mod tasks;
pub mod users;

use serde::Serialize;

const DEFAULT_PAGE_SIZE: u64 = 20;
const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub pages: u64,
}

impl Pagination {
    pub fn new(page: u64, per_page: u64, total: u64) -> Self {
        Self {
            page,
            per_page,
            total,
            pages: total.div_ceil(per_page.max(1)),
        }
    }
}

pub fn clamp_page_params(page: Option<u64>, per_page: Option<u64>) -> (u64, u64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    (page, per_page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_page_params() {
        assert_eq!(clamp_page_params(None, None), (1, 20));
        assert_eq!(clamp_page_params(Some(0), Some(0)), (1, 1));
        assert_eq!(clamp_page_params(Some(3), Some(500)), (3, 100));
    }

    #[test]
    fn test_pagination_page_count() {
        assert_eq!(Pagination::new(1, 10, 0).pages, 0);
        assert_eq!(Pagination::new(1, 10, 25).pages, 3);
    }
}
