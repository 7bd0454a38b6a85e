//! Query service against an in-memory mailbox.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use mailpager_core::time::MockClock;
use mailpager_core::{
    ApiResponse, Error, FetchedMessage, MailboxConnector, MailboxSession, QueryOutcome,
    QueryRequest, QueryService, Result, Settings, Status, decode_cursor,
};
use mailpager_imap::Uid;

const SEARCH_LATENCY: Duration = Duration::from_millis(100);
const FETCH_LATENCY: Duration = Duration::from_millis(10);

#[derive(Default)]
struct Mailbox {
    ids: Vec<Uid>,
    messages: HashMap<Uid, Vec<u8>>,
    broken: HashSet<Uid>,
    refuse_login: bool,
    opens: AtomicUsize,
    closes: AtomicUsize,
    searches: Mutex<Vec<String>>,
    fetched: AtomicUsize,
}

impl Mailbox {
    fn with_messages(n: u32) -> Self {
        let ids: Vec<Uid> = (1..=n).map(|i| Uid::new(i * 10).unwrap()).collect();
        let messages = ids
            .iter()
            .enumerate()
            .map(|(i, &uid)| (uid, raw_message(i + 1)))
            .collect();
        Self {
            ids,
            messages,
            ..Self::default()
        }
    }
}

fn raw_message(n: usize) -> Vec<u8> {
    format!(
        "From: Sender {n} <sender{n}@bank.example>\r\n\
         To: me@example.com\r\n\
         Subject: message {n}\r\n\
         Date: Mon, 01 Jul 2024 10:00:00 +0000\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         \r\n\
         body {n}"
    )
    .into_bytes()
}

#[derive(Clone)]
struct Connector {
    mailbox: Arc<Mailbox>,
    clock: Arc<MockClock>,
}

struct Session {
    mailbox: Arc<Mailbox>,
    clock: Arc<MockClock>,
}

impl MailboxConnector for Connector {
    type Session = Session;

    async fn open(&self, _mailbox: &str) -> Result<Session> {
        if self.mailbox.refuse_login {
            return Err(Error::Imap(mailpager_imap::Error::No(
                "[AUTHENTICATIONFAILED] Invalid credentials".into(),
            )));
        }
        self.mailbox.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Session {
            mailbox: Arc::clone(&self.mailbox),
            clock: Arc::clone(&self.clock),
        })
    }
}

impl MailboxSession for Session {
    async fn search_ids(&mut self, criteria: &str) -> Result<Vec<Uid>> {
        tokio::task::yield_now().await;
        self.clock.advance(SEARCH_LATENCY);
        self.mailbox
            .searches
            .lock()
            .unwrap()
            .push(criteria.to_string());
        Ok(self.mailbox.ids.clone())
    }

    async fn fetch_by_ids(&mut self, ids: &[Uid]) -> Vec<FetchedMessage> {
        let mut out = Vec::new();
        for uid in ids {
            tokio::task::yield_now().await;
            self.clock.advance(FETCH_LATENCY);
            self.mailbox.fetched.fetch_add(1, Ordering::SeqCst);
            if self.mailbox.broken.contains(uid) {
                continue;
            }
            if let Some(raw) = self.mailbox.messages.get(uid) {
                out.push(FetchedMessage {
                    uid: *uid,
                    raw: raw.clone(),
                });
            }
        }
        out
    }

    async fn close(self) -> Result<()> {
        self.mailbox.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn service(mailbox: Mailbox, page_size: u32) -> (QueryService<Connector>, Arc<Mailbox>) {
    let mailbox = Arc::new(mailbox);
    let clock = MockClock::shared();
    let settings = Settings {
        page_size,
        ..Settings::default()
    };
    let connector = Connector {
        mailbox: Arc::clone(&mailbox),
        clock: Arc::clone(&clock),
    };
    let service = QueryService::new(connector, &settings)
        .unwrap()
        .with_clock(clock);
    (service, mailbox)
}

fn july() -> QueryRequest {
    QueryRequest::new(
        "inbox",
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 8, 1).unwrap(),
    )
}

fn subjects(outcome: &QueryOutcome) -> Vec<String> {
    match outcome {
        QueryOutcome::Page(page) => page.items.iter().map(|m| m.subject.clone()).collect(),
        other => panic!("expected a page, got {other:?}"),
    }
}

#[tokio::test]
async fn walks_pages_with_cursors() {
    let (service, mailbox) = service(Mailbox::with_messages(23), 10);

    let first = service.get_paginated(&july()).await.unwrap();
    let QueryOutcome::Page(page) = &first.outcome else {
        panic!("expected a page");
    };
    assert_eq!(page.items.len(), 10);
    assert_eq!(page.items[0].subject, "message 1");
    assert_eq!(page.items[9].subject, "message 10");
    assert_eq!(page.items[0].from_email.as_deref(), Some("sender1@bank.example"));
    assert_eq!(page.pagination.total_items, 23);
    assert_eq!(page.pagination.total_pages, 3);
    assert_eq!(page.pagination.current_page, 1);
    assert!(page.pagination.prev_cursor.is_none());
    let next = page.pagination.next_cursor.clone().unwrap();
    assert_eq!(decode_cursor(&next).unwrap(), (2, 10));

    let second = service.get_paginated(&july().cursor(next)).await.unwrap();
    let QueryOutcome::Page(page) = &second.outcome else {
        panic!("expected a page");
    };
    assert_eq!(page.items[0].subject, "message 11");
    let next = page.pagination.next_cursor.clone().unwrap();

    let third = service.get_paginated(&july().cursor(next)).await.unwrap();
    let QueryOutcome::Page(page) = &third.outcome else {
        panic!("expected a page");
    };
    assert_eq!(page.items.len(), 3);
    assert_eq!(page.items[2].subject, "message 23");
    assert!(page.pagination.next_cursor.is_none());
    assert_eq!(
        decode_cursor(page.pagination.prev_cursor.as_deref().unwrap()).unwrap(),
        (2, 10)
    );

    // One search, then one fetch connection per page.
    assert_eq!(mailbox.searches.lock().unwrap().len(), 1);
    assert_eq!(mailbox.opens.load(Ordering::SeqCst), 4);
    assert_eq!(mailbox.closes.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn empty_search_is_no_content_and_not_cached() {
    let (service, mailbox) = service(Mailbox::default(), 10);

    let reply = service.get_paginated(&july()).await.unwrap();
    let QueryOutcome::NoContent { message } = &reply.outcome else {
        panic!("expected no content");
    };
    assert!(message.starts_with("No emails found for the given criteria = SINCE"));
    assert_eq!(reply.elapsed, SEARCH_LATENCY);

    let response = reply.into_response();
    assert_eq!(response.meta.status, Status::NoContent);
    assert!(response.data.is_none());

    service.get_paginated(&july()).await.unwrap();
    assert_eq!(mailbox.searches.lock().unwrap().len(), 2);
    assert_eq!(mailbox.closes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failed_fetch_is_skipped() {
    let mut mailbox = Mailbox::with_messages(3);
    mailbox.broken.insert(mailbox.ids[1]);
    let (service, _) = service(mailbox, 10);

    let reply = service.get_paginated(&july()).await.unwrap();
    assert_eq!(subjects(&reply.outcome), vec!["message 1", "message 3"]);

    let response = reply.into_response();
    assert_eq!(response.meta.status, Status::Ok);
    assert_eq!(response.meta.message, "2 Emails retrieved successfully");
    assert_eq!(response.data.unwrap().pagination.total_items, 3);
}

#[tokio::test]
async fn repeated_request_is_served_from_cache() {
    let (service, mailbox) = service(Mailbox::with_messages(5), 2);

    let first = service.get_paginated(&july().page(2)).await.unwrap();
    assert_eq!(first.elapsed, SEARCH_LATENCY + FETCH_LATENCY * 2);

    let again = service.get_paginated(&july().page(2)).await.unwrap();
    assert_eq!(again.elapsed, Duration::ZERO);
    assert_eq!(subjects(&again.outcome), subjects(&first.outcome));
    assert_eq!(mailbox.opens.load(Ordering::SeqCst), 2);

    // Same window, new page: only the fetch stage goes remote.
    let third = service.get_paginated(&july().page(3)).await.unwrap();
    assert_eq!(third.elapsed, FETCH_LATENCY);
    assert_eq!(subjects(&third.outcome), vec!["message 5"]);
}

#[tokio::test]
async fn different_senders_are_different_windows() {
    let (service, mailbox) = service(Mailbox::with_messages(2), 10);

    service.get_paginated(&july()).await.unwrap();
    service
        .get_paginated(&july().senders(vec!["a@x.example".into(), "b@x.example".into()]))
        .await
        .unwrap();

    let searches = mailbox.searches.lock().unwrap();
    assert_eq!(searches.len(), 2);
    assert_eq!(
        searches[1],
        r#"SINCE "01-Jul-2024" BEFORE "01-Aug-2024" ((OR FROM "a@x.example" FROM "b@x.example"))"#
    );
}

#[tokio::test]
async fn filter_keeps_unfiltered_totals() {
    let (service, _) = service(Mailbox::with_messages(23), 10);

    let request = july().filter(|message| message.subject.ends_with('1'));
    let reply = service.get_paginated(&request).await.unwrap();
    let QueryOutcome::Page(page) = &reply.outcome else {
        panic!("expected a page");
    };
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].subject, "message 1");
    assert_eq!(page.pagination.total_items, 23);
    assert_eq!(page.pagination.total_pages, 3);
    assert_eq!(
        reply.into_response().meta.message,
        "1 Emails retrieved successfully"
    );
}

#[tokio::test]
async fn filter_removing_everything_is_no_content() {
    let (service, _) = service(Mailbox::with_messages(4), 10);

    let reply = service
        .get_paginated(&july().filter(|_| false))
        .await
        .unwrap();
    assert_eq!(
        reply.outcome,
        QueryOutcome::NoContent {
            message: "Filtered out all documents".into()
        }
    );
}

#[tokio::test]
async fn every_fetch_failing_is_partial_content() {
    let mut mailbox = Mailbox::with_messages(2);
    mailbox.broken = mailbox.ids.iter().copied().collect();
    let (service, mailbox) = service(mailbox, 10);

    let reply = service.get_paginated(&july()).await.unwrap();
    let QueryOutcome::PartialContent(page) = &reply.outcome else {
        panic!("expected partial content");
    };
    assert!(page.items.is_empty());
    assert_eq!(page.pagination.total_items, 2);
    assert_eq!(reply.into_response().meta.status, Status::PartialContent);

    // The empty batch was not cached.
    service.get_paginated(&july()).await.unwrap();
    assert_eq!(mailbox.fetched.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn page_past_the_end_fetches_nothing() {
    let (service, mailbox) = service(Mailbox::with_messages(3), 10);

    let reply = service.get_paginated(&july().page(5)).await.unwrap();
    let QueryOutcome::Page(page) = &reply.outcome else {
        panic!("expected a page");
    };
    assert!(page.items.is_empty());
    assert_eq!(page.pagination.total_pages, 1);
    assert!(page.pagination.next_cursor.is_none());
    assert!(page.pagination.prev_cursor.is_some());
    assert_eq!(mailbox.opens.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn login_failure_propagates() {
    let mailbox = Mailbox {
        refuse_login: true,
        ..Mailbox::with_messages(3)
    };
    let (service, _) = service(mailbox, 10);

    let error = service.get_paginated(&july()).await.unwrap_err();
    assert!(matches!(error, Error::Imap(mailpager_imap::Error::No(_))));

    let response: ApiResponse<()> = ApiResponse::from_error(&error);
    assert_eq!(response.meta.status, Status::InternalServerError);
}

#[tokio::test]
async fn bad_cursor_is_rejected_before_connecting() {
    let (service, mailbox) = service(Mailbox::with_messages(3), 10);

    let error = service
        .get_paginated(&july().cursor("definitely-not-a-cursor"))
        .await
        .unwrap_err();
    assert!(matches!(error, Error::CursorDecode(_)));
    assert_eq!(
        ApiResponse::<()>::from_error(&error).meta.status,
        Status::BadRequest
    );
    assert_eq!(mailbox.opens.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn line_breaks_in_request_text_are_rejected_before_connecting() {
    let (service, mailbox) = service(Mailbox::with_messages(3), 10);
    let date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();

    let requests = [
        july().senders(vec!["a@example.com\r\nA9 DELETE Archive".to_string()]),
        july().subjects(vec!["hi\nA9 DELETE Archive".to_string()]),
        QueryRequest::new("inbox\r\nA9 DELETE Archive", date, date),
        QueryRequest::new("inbox\0", date, date),
    ];
    for request in &requests {
        let error = service.get_paginated(request).await.unwrap_err();
        assert!(matches!(error, Error::InvalidRequest(_)), "{request:?}");
        assert_eq!(
            ApiResponse::<()>::from_error(&error).meta.status,
            Status::BadRequest
        );
    }
    assert_eq!(mailbox.opens.load(Ordering::SeqCst), 0);
    assert!(mailbox.searches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_identical_requests_search_once() {
    let (service, mailbox) = service(Mailbox::with_messages(6), 3);
    let request = july();

    let (a, b, c) = tokio::join!(
        service.get_paginated(&request),
        service.get_paginated(&request),
        service.get_paginated(&request),
    );

    let a = a.unwrap();
    assert_eq!(subjects(&a.outcome), subjects(&b.unwrap().outcome));
    assert_eq!(subjects(&a.outcome), subjects(&c.unwrap().outcome));
    assert_eq!(mailbox.searches.lock().unwrap().len(), 1);
    assert_eq!(mailbox.fetched.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn queries_run_on_spawned_tasks() {
    let (service, mailbox) = service(Mailbox::with_messages(12), 5);
    let service = Arc::new(service);

    let tasks: Vec<_> = [1, 2, 3]
        .into_iter()
        .map(|page| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.get_paginated(&july().page(page)).await })
        })
        .collect();

    let mut sizes = Vec::new();
    for task in tasks {
        let reply = task.await.unwrap().unwrap();
        let QueryOutcome::Page(page) = reply.outcome else {
            panic!("expected a page");
        };
        sizes.push(page.items.len());
    }
    assert_eq!(sizes, vec![5, 5, 2]);
    assert_eq!(mailbox.searches.lock().unwrap().len(), 1);
}
