/// A 1-based page request with a bounded page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub limit: u32,
}

impl Page {
    /// Builds a page from optional client input.
    ///
    /// Missing or zero values fall back to page 1 and `default_limit`; the limit is clamped to `max_limit`.
    #[must_use]
    pub fn new(number: Option<u32>, limit: Option<u32>, default_limit: u32, max_limit: u32) -> Self {
        let number = number.filter(|n| *n > 0).unwrap_or(1);
        let limit = limit.filter(|l| *l > 0).unwrap_or(default_limit).min(max_limit.max(1));
        Self { number, limit }
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.number - 1) * u64::from(self.limit)
    }
}

#[derive(Debug, Clone)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: Page,
    pub total: u64,
}
