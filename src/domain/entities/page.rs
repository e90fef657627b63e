use serde::{Deserialize, Serialize};

/// One page of results in the shape every data source returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total_records: u64,
    pub limit: u32,
    pub page: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total_records: u64, page: u32, limit: u32) -> Self {
        Self {
            data,
            total_records,
            limit,
            page,
            total_pages: total_pages(total_records, limit),
        }
    }

    pub fn has_more(&self) -> bool {
        self.page < self.total_pages
    }
}

/// `ceil(total / limit)`, never below one.
pub fn total_pages(total_records: u64, limit: u32) -> u32 {
    let limit = u64::from(limit.max(1));
    let pages = total_records.div_ceil(limit).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_has_floor_of_one() {
        assert_eq!(total_pages(0, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(25, 10), 3);
    }

    #[test]
    fn has_more_compares_page_to_total_pages() {
        let page = Page::<u8>::new(Vec::new(), 25, 1, 10);
        assert!(page.has_more());
        let last = Page::<u8>::new(Vec::new(), 25, 3, 10);
        assert!(!last.has_more());
    }
}
