//! Pagination over a proxy query.
//!
//! The pager owns the query once bound. [`Pager::init`] counts the matching
//! rows, derives the last page and narrows the query to the current page;
//! [`Pager::results`] then fetches that page.

use tracing::debug;

use crate::error::{DatagridError, DatagridResult};
use crate::proxy_query::ProxyQuery;
use crate::value::Row;

/// Page size used when none is given.
pub const DEFAULT_MAX_PER_PAGE: i64 = 10;

/// Page state and the query it pages through.
#[derive(Debug, Clone)]
pub struct Pager {
    page: u32,
    max_per_page: u32,
    last_page: u32,
    nb_results: u64,
    cursor: u64,
    max_page_links: u32,
    count_column: String,
    query: Option<ProxyQuery>,
    results: Option<Vec<Row>>,
}

impl Default for Pager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PER_PAGE)
    }
}

impl Pager {
    /// Create a pager showing `max_per_page` rows per page (`0` disables paging).
    pub fn new(max_per_page: i64) -> Self {
        let mut pager = Self {
            page: 1,
            max_per_page: 0,
            last_page: 1,
            nb_results: 0,
            cursor: 1,
            max_page_links: 0,
            count_column: "id".to_string(),
            query: None,
            results: None,
        };
        pager.set_max_per_page(max_per_page);
        pager
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    /// Select a page. Non-positive pages select the first page, or page `0`
    /// when paging is disabled.
    pub fn set_page(&mut self, page: i64) {
        self.page = match u32::try_from(page) {
            Ok(page) if page > 0 => page,
            Ok(_) => u32::from(self.max_per_page > 0),
            Err(_) if page > 0 => u32::MAX,
            Err(_) => u32::from(self.max_per_page > 0),
        };
    }

    pub fn max_per_page(&self) -> u32 {
        self.max_per_page
    }

    /// Set the page size.
    ///
    /// `0` disables paging and forces page `0`; negative sizes become `1`.
    /// Enabling paging moves page `0` to page `1`.
    pub fn set_max_per_page(&mut self, max: i64) {
        if max == 0 {
            self.max_per_page = 0;
            self.page = 0;
            return;
        }

        self.max_per_page = if max > 0 {
            u32::try_from(max).unwrap_or(u32::MAX)
        } else {
            1
        };
        if self.page == 0 {
            self.page = 1;
        }
    }

    pub fn last_page(&self) -> u32 {
        self.last_page
    }

    /// Set the last page, pulling the current page back onto it if needed.
    pub(crate) fn set_last_page(&mut self, last_page: u32) {
        self.last_page = last_page;
        if self.page > last_page {
            self.set_page(i64::from(last_page));
        }
    }

    /// Total rows counted by the last `init`.
    pub fn nb_results(&self) -> u64 {
        self.nb_results
    }

    pub fn max_page_links(&self) -> u32 {
        self.max_page_links
    }

    pub fn set_max_page_links(&mut self, max_page_links: u32) {
        self.max_page_links = max_page_links;
    }

    pub fn count_column(&self) -> &str {
        &self.count_column
    }

    /// Column counted with `COUNT(DISTINCT ...)` by relational queries.
    pub fn set_count_column(&mut self, column: impl Into<String>) {
        self.count_column = column.into();
    }

    pub fn set_query(&mut self, query: ProxyQuery) {
        self.query = Some(query);
    }

    pub fn query(&self) -> Option<&ProxyQuery> {
        self.query.as_ref()
    }

    pub fn query_mut(&mut self) -> Option<&mut ProxyQuery> {
        self.query.as_mut()
    }

    fn require_query(&self) -> DatagridResult<&ProxyQuery> {
        self.query
            .as_ref()
            .ok_or_else(|| DatagridError::configuration("The pager has no query, call set_query first"))
    }

    /// Count the results and narrow the query to the current page.
    pub async fn init(&mut self) -> DatagridResult<()> {
        self.results = None;

        let nb_results = {
            let query = self.require_query()?;
            query.count(&self.count_column).await?
        };
        self.nb_results = nb_results;

        let mut window = None;
        if self.page == 0 || self.max_per_page == 0 || nb_results == 0 {
            self.set_last_page(1);
        } else {
            let max = u64::from(self.max_per_page);
            let last_page = u32::try_from(nb_results.div_ceil(max)).unwrap_or(u32::MAX);
            self.set_last_page(last_page);
            window = Some((u64::from(self.page - 1) * max, max));
        }

        if let Some(query) = self.query.as_mut() {
            query
                .set_first_result(window.map(|(offset, _)| offset))
                .set_max_results(window.map(|(_, limit)| limit));
        }

        debug!(
            page = self.page,
            max_per_page = self.max_per_page,
            nb_results = self.nb_results,
            last_page = self.last_page,
            "pager initialised"
        );
        Ok(())
    }

    /// Fetch the current page.
    pub async fn results(&mut self) -> DatagridResult<Vec<Row>> {
        let query = self
            .query
            .as_mut()
            .ok_or_else(|| DatagridError::configuration("The pager has no query, call set_query first"))?;
        let rows = query.execute().await?;
        self.results = Some(rows.clone());
        Ok(rows)
    }

    /// Rows of the last `results` call since `init`.
    pub fn cached_results(&self) -> Option<&[Row]> {
        self.results.as_deref()
    }

    /// Whether there is more than one page.
    pub fn have_to_paginate(&self) -> bool {
        self.max_per_page > 0 && self.nb_results > u64::from(self.max_per_page)
    }

    /// Up to `nb_links` page numbers around the current page, all within
    /// `1..=last_page`. Defaults to [`max_page_links`](Self::max_page_links).
    pub fn links(&self, nb_links: Option<u32>) -> Vec<u32> {
        let nb_links = i64::from(nb_links.unwrap_or(self.max_page_links));
        let last_page = i64::from(self.last_page);

        let tmp = i64::from(self.page) - nb_links / 2;
        let check = last_page - nb_links + 1;
        let limit = if check > 0 { check } else { 1 };
        let begin = if tmp > 0 { tmp.min(limit) } else { 1 };

        (begin..begin + nb_links)
            .take_while(|&page| page <= last_page)
            .filter_map(|page| u32::try_from(page).ok())
            .collect()
    }

    /// Highest page number shown by [`links`](Self::links) with the default count.
    pub fn current_max_link(&self) -> u32 {
        self.links(None).last().copied().unwrap_or(1)
    }

    pub fn first_page(&self) -> u32 {
        1
    }

    pub fn next_page(&self) -> u32 {
        self.page.saturating_add(1).min(self.last_page)
    }

    pub fn previous_page(&self) -> u32 {
        self.page.saturating_sub(1).max(self.first_page())
    }

    pub fn is_first_page(&self) -> bool {
        self.page == 1
    }

    pub fn is_last_page(&self) -> bool {
        self.page == self.last_page
    }

    /// 1-based position of the first row of the current page.
    pub fn first_indice(&self) -> u64 {
        if self.page == 0 {
            return 1;
        }
        u64::from(self.page - 1) * u64::from(self.max_per_page) + 1
    }

    /// 1-based position of the last row of the current page.
    pub fn last_indice(&self) -> u64 {
        if self.page == 0 {
            return self.nb_results;
        }
        let end = u64::from(self.page) * u64::from(self.max_per_page);
        end.min(self.nb_results)
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Move the cursor, clamped to `1..=nb_results`.
    pub fn set_cursor(&mut self, position: i64) {
        self.cursor = if position < 1 {
            1
        } else {
            u64::try_from(position)
                .unwrap_or(u64::MAX)
                .min(self.nb_results)
        };
    }

    /// Move the cursor and fetch the row there.
    pub async fn object_by_cursor(&mut self, position: i64) -> DatagridResult<Option<Row>> {
        self.set_cursor(position);
        self.current().await
    }

    /// Row at the cursor.
    pub async fn current(&self) -> DatagridResult<Option<Row>> {
        self.retrieve_object(self.cursor).await
    }

    /// Row after the cursor, `None` past the last result.
    pub async fn next(&self) -> DatagridResult<Option<Row>> {
        self.retrieve_object(self.cursor.saturating_add(1)).await
    }

    /// Row before the cursor, `None` before the first result.
    pub async fn previous(&self) -> DatagridResult<Option<Row>> {
        self.retrieve_object(self.cursor.saturating_sub(1)).await
    }

    /// Fetch the single row at a 1-based position through a copy of the query.
    async fn retrieve_object(&self, position: u64) -> DatagridResult<Option<Row>> {
        if position < 1 || position > self.nb_results {
            return Ok(None);
        }

        let mut query = self.require_query()?.clone();
        query
            .set_first_result(Some(position - 1))
            .set_max_results(Some(1));
        let rows = query.execute().await?;
        Ok(rows.into_iter().next())
    }
}
