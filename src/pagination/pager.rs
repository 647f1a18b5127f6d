use async_trait::async_trait;

use crate::error::{AppError, Result};

/// Items that can name the position right after themselves in their collection.
pub trait Paginated {
    type Cursor;

    fn cursor(&self) -> Self::Cursor;
}

/// A remote collection ordered newest-first and addressable by cursor.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send;
    type Cursor: Send + Sync;

    /// Up to `limit` items, strictly after `cursor` when one is given.
    async fn fetch(
        &self,
        cursor: Option<&Self::Cursor>,
        limit: usize,
    ) -> Result<Batch<Self::Item, Self::Cursor>>;
}

/// One response of a page source. `scanned` and `last` describe the raw
/// response, which can hold entries the source could not turn into items.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T, C> {
    pub items: Vec<T>,
    pub scanned: usize,
    pub last: Option<C>,
}

impl<T: Paginated> Batch<T, T::Cursor> {
    /// A batch where every raw entry became an item.
    pub fn complete(items: Vec<T>) -> Self {
        Self {
            scanned: items.len(),
            last: items.last().map(|item| item.cursor()),
            items,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T, C> {
    pub items: Vec<T>,
    /// A full page is taken to mean more may follow. Only an empty page is an
    /// authoritative end of data, so this can be one page optimistic.
    pub has_more: bool,
    /// Where the next page starts; `None` when the response was empty.
    pub next_cursor: Option<C>,
}

/// Fetches successive pages; callers must not run two fetches at once for the same feed.
pub struct CursorPager<S> {
    source: S,
}

impl<S: PageSource> CursorPager<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn fetch_first_page(&self, page_size: usize) -> Result<Page<S::Item, S::Cursor>> {
        check_page_size(page_size)?;

        let batch = self
            .source
            .fetch(None, page_size)
            .await
            .map_err(AppError::pagination)?;
        let has_more = batch.scanned >= page_size;

        Ok(Page {
            items: batch.items,
            has_more,
            next_cursor: batch.last,
        })
    }

    pub async fn fetch_next_page(
        &self,
        cursor: &S::Cursor,
        page_size: usize,
    ) -> Result<Page<S::Item, S::Cursor>> {
        check_page_size(page_size)?;

        let batch = self
            .source
            .fetch(Some(cursor), page_size)
            .await
            .map_err(AppError::pagination)?;
        let has_more = batch.scanned > 0 && batch.scanned >= page_size;

        Ok(Page {
            items: batch.items,
            has_more,
            next_cursor: batch.last,
        })
    }
}

fn check_page_size(page_size: usize) -> Result<()> {
    if page_size == 0 {
        return Err(AppError::Config("page size must be greater than zero".to_string()));
    }
    Ok(())
}
