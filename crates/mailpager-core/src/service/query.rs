//! Paginated search over a mailbox.
//!
//! One request runs up to two remote stages, each on its own connection:
//!
//! 1. `UID SEARCH` for the full id list of the criteria, cached per
//!    (criteria, mailbox).
//! 2. `UID FETCH` of the ids on the requested page, cached per
//!    (criteria, mailbox, page, page size) as decoded messages.
//!
//! A stage answered from cache costs no remote time and opens no
//! connection.

use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use mailpager_imap::Uid;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use crate::cache::SharedCache;
use crate::config::Settings;
use crate::criteria::{SearchCriteria, define_criteria};
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::mailbox::{MailboxConnector, MailboxSession, with_mailbox};
use crate::message::StructuredMessage;
use crate::response::{ApiResponse, Page, PaginationMeta, Status};
use crate::time::{Clock, SystemClock};

/// Predicate applied to each message of a page after decoding.
pub type MessageFilter = Arc<dyn Fn(&StructuredMessage) -> bool + Send + Sync>;

/// One paginated search.
#[derive(Clone)]
pub struct QueryRequest {
    /// Mailbox to search.
    pub mailbox: String,
    /// First day included.
    pub start_date: NaiveDate,
    /// First day excluded.
    pub end_date: NaiveDate,
    /// Opaque cursor from a previous response.
    pub cursor: Option<String>,
    /// Explicit page; wins over the cursor.
    pub page: Option<u32>,
    /// Explicit page size; wins over the cursor.
    pub page_size: Option<u32>,
    /// Sender addresses, any of which may match.
    pub senders: Vec<String>,
    /// Subjects, any of which may match.
    pub subjects: Vec<String>,
    /// Post-fetch filter.
    pub filter: Option<MessageFilter>,
}

impl QueryRequest {
    /// First page of `mailbox` between two dates, no other filters.
    #[must_use]
    pub fn new(mailbox: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            mailbox: mailbox.into(),
            start_date,
            end_date,
            cursor: None,
            page: None,
            page_size: None,
            senders: Vec::new(),
            subjects: Vec::new(),
            filter: None,
        }
    }

    /// Continues from a cursor.
    #[must_use]
    pub fn cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    /// Requests an explicit page.
    #[must_use]
    pub const fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Requests an explicit page size.
    #[must_use]
    pub const fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Restricts to these senders.
    #[must_use]
    pub fn senders(mut self, senders: Vec<String>) -> Self {
        self.senders = senders;
        self
    }

    /// Restricts to these subjects.
    #[must_use]
    pub fn subjects(mut self, subjects: Vec<String>) -> Self {
        self.subjects = subjects;
        self
    }

    /// Drops messages for which `filter` returns false.
    #[must_use]
    pub fn filter(mut self, filter: impl Fn(&StructuredMessage) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Rejects text that cannot be sent inside a single IMAP command line.
    fn check_text_fields(&self) -> Result<()> {
        let breaks_line = |value: &str| value.contains(['\r', '\n', '\0']);
        if breaks_line(&self.mailbox) {
            return Err(Error::InvalidRequest(
                "mailbox must not contain CR, LF or NUL".into(),
            ));
        }
        if self.senders.iter().any(|s| breaks_line(s.as_str())) {
            return Err(Error::InvalidRequest(
                "senders must not contain CR, LF or NUL".into(),
            ));
        }
        if self.subjects.iter().any(|s| breaks_line(s.as_str())) {
            return Err(Error::InvalidRequest(
                "subjects must not contain CR, LF or NUL".into(),
            ));
        }
        Ok(())
    }

    /// Works out the page to serve. Explicit values win, the cursor fills
    /// in what is missing, then page 1 and `default_page_size`.
    fn resolve_cursor(&self, default_page_size: NonZeroU32) -> Result<Cursor> {
        let from_token = self.cursor.as_deref().map(Cursor::decode).transpose()?;

        let page = match self.page {
            Some(page) => NonZeroU32::new(page)
                .ok_or_else(|| Error::InvalidRequest("page must be at least 1".into()))?,
            None => from_token.map_or(NonZeroU32::MIN, |cursor| cursor.page),
        };
        let page_size = match self.page_size {
            Some(size) => NonZeroU32::new(size)
                .ok_or_else(|| Error::InvalidRequest("page_size must be at least 1".into()))?,
            None => from_token.map_or(default_page_size, |cursor| cursor.page_size),
        };

        Ok(Cursor { page, page_size })
    }
}

impl fmt::Debug for QueryRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryRequest")
            .field("mailbox", &self.mailbox)
            .field("start_date", &self.start_date)
            .field("end_date", &self.end_date)
            .field("cursor", &self.cursor)
            .field("page", &self.page)
            .field("page_size", &self.page_size)
            .field("senders", &self.senders)
            .field("subjects", &self.subjects)
            .field("filter", &self.filter.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// What a query produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The search matched nothing, or the filter removed the whole page.
    NoContent {
        /// Why there is nothing to show.
        message: String,
    },
    /// The page has ids but none of them could be fetched.
    PartialContent(Page<Arc<StructuredMessage>>),
    /// A page of messages, possibly empty past the last page.
    Page(Page<Arc<StructuredMessage>>),
}

/// A query outcome plus the remote time spent producing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryReply {
    /// Outcome.
    pub outcome: QueryOutcome,
    /// Sum of the remote stages that were not served from cache.
    pub elapsed: Duration,
}

impl QueryReply {
    /// Renders the reply as a response envelope.
    #[must_use]
    pub fn into_response(self) -> ApiResponse<Page<Arc<StructuredMessage>>> {
        match self.outcome {
            QueryOutcome::NoContent { message } => {
                ApiResponse::empty(Status::NoContent, message, self.elapsed)
            }
            QueryOutcome::PartialContent(page) => {
                let message = format!(
                    "None of the {} Emails on this page could be retrieved",
                    page_len(&page.pagination)
                );
                ApiResponse::with_data(Status::PartialContent, message, self.elapsed, page)
            }
            QueryOutcome::Page(page) => {
                let message = format!("{} Emails retrieved successfully", page.items.len());
                ApiResponse::with_data(Status::Ok, message, self.elapsed, page)
            }
        }
    }
}

/// Number of ids that fall on the page described by `pagination`.
fn page_len(pagination: &PaginationMeta) -> usize {
    let size = pagination.page_size as usize;
    let offset = (pagination.current_page as usize - 1).saturating_mul(size);
    pagination.total_items.saturating_sub(offset).min(size)
}

/// Paginated, cached search over one account.
pub struct QueryService<C> {
    connector: C,
    default_page_size: NonZeroU32,
    id_lists: SharedCache<Uid>,
    batches: SharedCache<Arc<StructuredMessage>>,
    clock: Arc<dyn Clock>,
}

impl<C> fmt::Debug for QueryService<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryService")
            .field("default_page_size", &self.default_page_size)
            .field("id_lists", &self.id_lists)
            .field("batches", &self.batches)
            .finish_non_exhaustive()
    }
}

impl<C: MailboxConnector> QueryService<C> {
    /// Creates a service with cache sizes and page size from `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a size or capacity is zero.
    pub fn new(connector: C, settings: &Settings) -> Result<Self> {
        Ok(Self {
            connector,
            default_page_size: settings.default_page_size()?,
            id_lists: SharedCache::new("id_lists", settings.id_list_capacity()?),
            batches: SharedCache::new("batches", settings.message_list_capacity()?),
            clock: Arc::new(SystemClock),
        })
    }

    /// Replaces the clock used to time remote stages.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Serves one page of a search.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CursorDecode`] or [`Error::InvalidRequest`] for bad
    /// paging input, and [`Error::Imap`] when a connection cannot be opened
    /// or the search itself fails. Individual messages that cannot be
    /// fetched are skipped, not reported.
    #[instrument(skip_all, fields(mailbox = %request.mailbox))]
    pub async fn get_paginated(&self, request: &QueryRequest) -> Result<QueryReply> {
        request.check_text_fields()?;
        let cursor = request.resolve_cursor(self.default_page_size)?;
        let criteria = define_criteria(
            request.start_date,
            request.end_date,
            &request.senders,
            &request.subjects,
        );
        let id_key = id_list_key(&criteria, &request.mailbox);
        let mut elapsed = Duration::ZERO;

        let ids = {
            let elapsed = &mut elapsed;
            let rendered = criteria.build();
            self.id_lists
                .get_or_load(&id_key, move || async move {
                    let started = self.clock.now();
                    let ids = with_mailbox(&self.connector, &request.mailbox, |session| {
                        Box::pin(async move { session.search_ids(&rendered).await })
                    })
                    .await?;
                    *elapsed += self.clock.elapsed(started);
                    Ok::<_, Error>(Arc::from(ids))
                })
                .await?
        };

        if ids.is_loaded() {
            info!(%criteria, "Id list fetched from server");
        } else {
            info!(%criteria, "Id list served from cache");
        }
        let ids = ids.into_inner();

        if ids.is_empty() {
            info!(%criteria, "No emails matched");
            return Ok(QueryReply {
                outcome: QueryOutcome::NoContent {
                    message: format!("No emails found for the given criteria = {criteria}"),
                },
                elapsed,
            });
        }

        let total_items = ids.len();
        let page_ids = page_slice(&ids, &cursor);
        debug!(
            total_items,
            page = cursor.page.get(),
            page_size = cursor.page_size.get(),
            on_page = page_ids.len(),
            "Paginated id list"
        );

        let messages: Arc<[Arc<StructuredMessage>]> = if page_ids.is_empty() {
            Arc::from(Vec::new())
        } else {
            let batch_key = batch_key(&id_key, &cursor);
            let elapsed = &mut elapsed;
            let wanted = page_ids.to_vec();
            let batch = self
                .batches
                .get_or_load(&batch_key, move || async move {
                    let started = self.clock.now();
                    let fetched = with_mailbox(&self.connector, &request.mailbox, |session| {
                        Box::pin(async move { Ok(session.fetch_by_ids(&wanted).await) })
                    })
                    .await?;
                    *elapsed += self.clock.elapsed(started);

                    let decoded: Vec<_> = fetched
                        .iter()
                        .map(|message| Arc::new(StructuredMessage::decode(&message.raw)))
                        .collect();
                    debug!(fetched = fetched.len(), "Decoded page");
                    Ok::<_, Error>(Arc::from(decoded))
                })
                .await?;

            if batch.is_loaded() {
                info!(key = %batch_key, "Page fetched from server");
            } else {
                info!(key = %batch_key, "Page served from cache");
            }
            batch.into_inner()
        };

        let pagination = pagination(total_items, &cursor);

        if messages.is_empty() && !page_ids.is_empty() {
            info!(requested = page_ids.len(), "Every fetch on the page failed");
            return Ok(QueryReply {
                outcome: QueryOutcome::PartialContent(Page {
                    items: Vec::new(),
                    pagination,
                }),
                elapsed,
            });
        }

        let mut items = messages.to_vec();
        if let Some(filter) = &request.filter {
            let before = items.len();
            items.retain(|message| filter(message));
            info!(before, after = items.len(), "Applied filter");
            if before > 0 && items.is_empty() {
                return Ok(QueryReply {
                    outcome: QueryOutcome::NoContent {
                        message: "Filtered out all documents".to_string(),
                    },
                    elapsed,
                });
            }
        }

        info!(count = items.len(), "Emails retrieved");
        Ok(QueryReply {
            outcome: QueryOutcome::Page(Page { items, pagination }),
            elapsed,
        })
    }
}

/// SHA-256 hex digest of the rendered criteria and the mailbox name.
fn id_list_key(criteria: &SearchCriteria, mailbox: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(criteria.build().as_bytes());
    hasher.update([0u8]);
    hasher.update(mailbox.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn batch_key(id_key: &str, cursor: &Cursor) -> String {
    format!("{id_key}:{}:{}", cursor.page, cursor.page_size)
}

/// Ids on the page; empty past the end.
fn page_slice<'a>(ids: &'a [Uid], cursor: &Cursor) -> &'a [Uid] {
    let offset = cursor.offset().min(ids.len());
    let end = offset
        .saturating_add(cursor.page_size.get() as usize)
        .min(ids.len());
    &ids[offset..end]
}

fn pagination(total_items: usize, cursor: &Cursor) -> PaginationMeta {
    let total_pages = total_items.div_ceil(cursor.page_size.get() as usize);
    let page = cursor.page.get() as usize;

    PaginationMeta {
        total_items,
        total_pages,
        page_size: cursor.page_size.get(),
        current_page: cursor.page.get(),
        next_cursor: (page < total_pages)
            .then(|| cursor.next())
            .flatten()
            .map(|next| next.encode()),
        prev_cursor: cursor.prev().map(|prev| prev.encode()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cursor::decode_cursor;

    fn ids(n: u32) -> Vec<Uid> {
        (1..=n).map(|i| Uid::new(i).unwrap()).collect()
    }

    #[test]
    fn slices_pages() {
        let all = ids(23);
        let first = page_slice(&all, &Cursor::new(1, 10).unwrap());
        assert_eq!(first, &all[0..10]);
        let last = page_slice(&all, &Cursor::new(3, 10).unwrap());
        assert_eq!(last.len(), 3);
        assert!(page_slice(&all, &Cursor::new(4, 10).unwrap()).is_empty());
        assert!(page_slice(&all, &Cursor::new(u32::MAX, u32::MAX).unwrap()).is_empty());
    }

    #[test]
    fn pagination_cursors() {
        let first = pagination(23, &Cursor::new(1, 10).unwrap());
        assert_eq!(first.total_pages, 3);
        assert!(first.prev_cursor.is_none());
        assert_eq!(decode_cursor(first.next_cursor.as_deref().unwrap()).unwrap(), (2, 10));

        let middle = pagination(23, &Cursor::new(2, 10).unwrap());
        assert_eq!(decode_cursor(middle.prev_cursor.as_deref().unwrap()).unwrap(), (1, 10));

        let last = pagination(23, &Cursor::new(3, 10).unwrap());
        assert!(last.next_cursor.is_none());
        assert!(last.prev_cursor.is_some());

        let exact = pagination(20, &Cursor::new(2, 10).unwrap());
        assert_eq!(exact.total_pages, 2);
        assert!(exact.next_cursor.is_none());
    }

    #[test]
    fn keys_depend_on_mailbox_and_page() {
        let criteria = SearchCriteria::new().all();
        let inbox = id_list_key(&criteria, "inbox");
        assert_eq!(inbox.len(), 64);
        assert_eq!(inbox, id_list_key(&criteria, "inbox"));
        assert_ne!(inbox, id_list_key(&criteria, "archive"));

        let page = batch_key(&inbox, &Cursor::new(2, 15).unwrap());
        assert_eq!(page, format!("{inbox}:2:15"));
    }

    #[test]
    fn cursor_resolution() {
        let date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let default = NonZeroU32::new(15).unwrap();
        let request = QueryRequest::new("inbox", date, date);
        assert_eq!(request.resolve_cursor(default).unwrap(), Cursor::new(1, 15).unwrap());

        let token = Cursor::new(3, 5).unwrap().encode();
        let from_token = request.clone().cursor(token.clone());
        assert_eq!(from_token.resolve_cursor(default).unwrap(), Cursor::new(3, 5).unwrap());

        let explicit_page = request.clone().cursor(token).page(7);
        assert_eq!(explicit_page.resolve_cursor(default).unwrap(), Cursor::new(7, 5).unwrap());

        assert!(matches!(
            request.clone().cursor("not a cursor!").resolve_cursor(default),
            Err(Error::CursorDecode(_))
        ));
        assert!(matches!(
            request.page_size(0).resolve_cursor(default),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn partial_content_message_counts_page_ids() {
        let pagination = pagination(23, &Cursor::new(3, 10).unwrap());
        assert_eq!(page_len(&pagination), 3);
    }
}
