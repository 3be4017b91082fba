/// Which slice of a listing the caller asked for. [page] is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    /// Builds a page request from optional query inputs, falling back to the
    /// first page and [default_per_page]. Zero values are bumped to 1 so the
    /// offset math stays sane.
    pub fn from_params(page: Option<u32>, per_page: Option<u32>, default_per_page: u32) -> PageRequest {
        PageRequest {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(default_per_page).max(1),
        }
    }

    /// Number of rows to skip before this page starts
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }
}

/// The raw result of a paged driven-port read: one page of rows plus the
/// total matching row count before slicing.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(Clone))]
pub struct PagedRecords<T> {
    pub items: Vec<T>,
    pub total: i64,
}

/// A fully-assembled page of results with the metadata the API exposes
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(Clone))]
pub struct Page<T> {
    pub items: Vec<T>,
    pub current_page: u32,
    pub per_page: u32,
    pub total: i64,
    pub last_page: u32,
}

impl<T> Page<T> {
    /// Combines a driven port's paged read with the original request to
    /// produce page metadata. Requesting a page past the end yields an empty
    /// page rather than an error.
    pub fn assemble(records: PagedRecords<T>, request: &PageRequest) -> Page<T> {
        let pages_needed = (records.total + i64::from(request.per_page) - 1) / i64::from(request.per_page);
        Page {
            items: records.items,
            current_page: request.page,
            per_page: request.per_page,
            total: records.total,
            last_page: pages_needed.max(1) as u32,
        }
    }

    /// 1-based index of the first item on this page, or None if the page is empty
    pub fn from_index(&self) -> Option<i64> {
        if self.items.is_empty() {
            None
        } else {
            Some(i64::from(self.current_page - 1) * i64::from(self.per_page) + 1)
        }
    }

    /// 1-based index of the last item on this page, or None if the page is empty
    pub fn to_index(&self) -> Option<i64> {
        self.from_index().map(|from| from + self.items.len() as i64 - 1)
    }

    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page
    }
}
