use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use linkhelper_core::{ChatRef, MessageRef, ResolutionJob};
use linkhelper_scraper::format::{DISCOVERY_FAILED_MESSAGE, JOB_FAILED_MESSAGE};
use linkhelper_scraper::{CatalogSource, LinkResolver, PageLinkSource, Pipeline, ScraperError};

use super::*;
use crate::test_support::{Delivered, RecordingTransport};

/// Panics on `boom`, stalls on `slow`, otherwise maps
/// `https://w.test/share/<x>` to `https://shop.test/<x>`.
struct ScriptedResolver;

#[async_trait]
impl LinkResolver for ScriptedResolver {
    async fn resolve(&self, url: &str) -> Option<String> {
        if url.contains("boom") {
            panic!("resolver exploded on {url}");
        }
        if url.contains("slow") {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        url.strip_prefix("https://w.test/share/")
            .map(|rest| format!("https://shop.test/{rest}"))
    }
}

struct NoCatalog;

#[async_trait]
impl CatalogSource for NoCatalog {
    async fn extract_via_api(&self, _page_url: &str) -> Vec<String> {
        Vec::new()
    }
}

/// Every rendered page times out waiting for share links.
struct TimedOutPages;

#[async_trait]
impl PageLinkSource for TimedOutPages {
    async fn extract(&self, page_url: &str) -> Result<Vec<String>, ScraperError> {
        Err(ScraperError::MarkerTimeout {
            url: page_url.to_owned(),
            waited_secs: 30,
        })
    }
}

/// Panics on the first delivery of anything but the failure notice.
struct PanicsOnFirstReply {
    inner: RecordingTransport,
    tripped: std::sync::atomic::AtomicBool,
}

impl PanicsOnFirstReply {
    fn trip(&self, reply: &FormattedReply) {
        if reply.text != JOB_FAILED_MESSAGE && !self.tripped.swap(true, Ordering::SeqCst) {
            panic!("transport exploded");
        }
    }
}

#[async_trait]
impl ChatTransport for PanicsOnFirstReply {
    async fn send(
        &self,
        chat: ChatRef,
        reply: &FormattedReply,
    ) -> Result<MessageRef, crate::transport::TransportError> {
        self.trip(reply);
        self.inner.send(chat, reply).await
    }

    async fn edit(
        &self,
        chat: ChatRef,
        message: MessageRef,
        reply: &FormattedReply,
    ) -> Result<(), crate::transport::TransportError> {
        self.trip(reply);
        self.inner.edit(chat, message, reply).await
    }
}

fn pipeline() -> Arc<Pipeline> {
    Arc::new(Pipeline::new(
        Arc::new(ScriptedResolver),
        Arc::new(NoCatalog),
        Arc::new(TimedOutPages),
        4,
    ))
}

fn start(workers: usize) -> (Dispatcher, ConsumerHandle, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::new());
    let (dispatcher, consumer) = Dispatcher::start(
        pipeline(),
        Arc::clone(&transport) as Arc<dyn ChatTransport>,
        10,
        workers,
    );
    (dispatcher, consumer, transport)
}

#[test]
fn submit_reports_full_queue() {
    let (dispatcher, _rx) = Dispatcher::channel(1);
    dispatcher
        .submit(ResolutionJob::new(ChatRef(1), "https://w.test/share/a"))
        .expect("first job fits");
    assert_eq!(dispatcher.capacity_left(), 0);

    let err = dispatcher
        .submit(ResolutionJob::new(ChatRef(1), "https://w.test/share/b"))
        .unwrap_err();
    assert_eq!(err, DispatchError::QueueFull);
}

#[test]
fn submit_without_consumer_is_closed() {
    let (dispatcher, rx) = Dispatcher::channel(4);
    drop(rx);
    let err = dispatcher
        .submit(ResolutionJob::new(ChatRef(1), "https://w.test/share/a"))
        .unwrap_err();
    assert_eq!(err, DispatchError::Closed);
}

#[tokio::test]
async fn reply_replaces_placeholder_when_present() {
    let (dispatcher, consumer, transport) = start(1);

    dispatcher
        .submit(
            ResolutionJob::new(ChatRef(5), "https://w.test/share/shoe")
                .with_placeholder(Some(MessageRef(77))),
        )
        .unwrap();
    consumer.shutdown(Duration::from_secs(5)).await;

    let delivered = transport.delivered();
    assert_eq!(delivered.len(), 1);
    match &delivered[0] {
        Delivered::Edited {
            chat,
            message,
            text,
        } => {
            assert_eq!((*chat, *message), (5, 77));
            assert!(text.contains("https://shop.test/shoe"), "got: {text}");
        }
        other => panic!("expected an edit, got {other:?}"),
    }
}

#[tokio::test]
async fn reply_is_sent_fresh_without_placeholder() {
    let (dispatcher, consumer, transport) = start(1);

    dispatcher
        .submit(ResolutionJob::new(ChatRef(6), "https://w.test/share/hat"))
        .unwrap();
    consumer.shutdown(Duration::from_secs(5)).await;

    let delivered = transport.delivered();
    assert!(matches!(&delivered[..], [Delivered::Sent { chat: 6, .. }]));
}

#[tokio::test]
async fn panic_in_one_job_does_not_stop_the_next() {
    let (dispatcher, consumer, transport) = start(1);

    dispatcher
        .submit(
            ResolutionJob::new(ChatRef(1), "https://w.test/share/boom")
                .with_placeholder(Some(MessageRef(10))),
        )
        .unwrap();
    dispatcher
        .submit(ResolutionJob::new(ChatRef(2), "https://w.test/share/ok"))
        .unwrap();
    consumer.shutdown(Duration::from_secs(5)).await;

    let delivered = transport.delivered();
    assert_eq!(delivered.len(), 2, "both jobs must reply: {delivered:?}");

    let first = delivered.iter().find(|d| d.chat() == 1).unwrap();
    assert_eq!(
        first,
        &Delivered::Edited {
            chat: 1,
            message: 10,
            text: JOB_FAILED_MESSAGE.to_owned(),
        }
    );

    let second = delivered.iter().find(|d| d.chat() == 2).unwrap();
    assert!(second.text().contains("https://shop.test/ok"));
}

#[tokio::test]
async fn discovery_failure_gets_invalid_or_private_reply() {
    let (dispatcher, consumer, transport) = start(2);

    dispatcher
        .submit(ResolutionJob::new(ChatRef(3), "https://w.test/creator"))
        .unwrap();
    consumer.shutdown(Duration::from_secs(5)).await;

    let delivered = transport.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].text(), DISCOVERY_FAILED_MESSAGE);
}

#[tokio::test]
async fn parallel_workers_deliver_every_job() {
    let (dispatcher, consumer, transport) = start(3);

    for i in 0..6 {
        dispatcher
            .submit(ResolutionJob::new(
                ChatRef(i),
                format!("https://w.test/share/item{i}"),
            ))
            .unwrap();
    }
    consumer.shutdown(Duration::from_secs(5)).await;

    let mut chats: Vec<i64> = transport.delivered().iter().map(Delivered::chat).collect();
    chats.sort_unstable();
    assert_eq!(chats, vec![0, 1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn drain_timeout_abandons_stuck_jobs() {
    let (dispatcher, consumer, transport) = start(1);

    dispatcher
        .submit(ResolutionJob::new(ChatRef(9), "https://w.test/share/slow"))
        .unwrap();
    dispatcher
        .submit(ResolutionJob::new(ChatRef(9), "https://w.test/share/queued"))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = std::time::Instant::now();
    consumer.shutdown(Duration::from_millis(200)).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(transport.delivered().is_empty());
}

#[tokio::test]
async fn submit_after_shutdown_is_closed() {
    let (dispatcher, consumer, _transport) = start(1);
    consumer.shutdown(Duration::from_secs(1)).await;

    let err = dispatcher
        .submit(ResolutionJob::new(ChatRef(1), "https://w.test/share/late"))
        .unwrap_err();
    assert_eq!(err, DispatchError::Closed);
}

#[tokio::test]
async fn transport_failure_is_logged_not_fatal() {
    let transport = Arc::new(RecordingTransport::failing());
    let (dispatcher, consumer) = Dispatcher::start(
        pipeline(),
        Arc::clone(&transport) as Arc<dyn ChatTransport>,
        4,
        1,
    );

    dispatcher
        .submit(ResolutionJob::new(ChatRef(1), "https://w.test/share/a"))
        .unwrap();
    dispatcher
        .submit(ResolutionJob::new(ChatRef(2), "https://w.test/share/b"))
        .unwrap();
    consumer.shutdown(Duration::from_secs(5)).await;

    assert!(transport.delivered().is_empty());
}

#[tokio::test]
async fn panic_during_delivery_sends_failure_notice() {
    let transport = Arc::new(PanicsOnFirstReply {
        inner: RecordingTransport::new(),
        tripped: std::sync::atomic::AtomicBool::new(false),
    });
    let (dispatcher, consumer) = Dispatcher::start(
        pipeline(),
        Arc::clone(&transport) as Arc<dyn ChatTransport>,
        4,
        1,
    );
    let in_flight = Arc::clone(&consumer.in_flight);

    dispatcher
        .submit(
            ResolutionJob::new(ChatRef(4), "https://w.test/share/cap")
                .with_placeholder(Some(MessageRef(40))),
        )
        .unwrap();
    dispatcher
        .submit(ResolutionJob::new(ChatRef(8), "https://w.test/share/bag"))
        .unwrap();
    consumer.shutdown(Duration::from_secs(5)).await;

    let delivered = transport.inner.delivered();
    assert_eq!(
        delivered[0],
        Delivered::Edited {
            chat: 4,
            message: 40,
            text: JOB_FAILED_MESSAGE.to_owned(),
        }
    );
    assert!(delivered[1].text().contains("https://shop.test/bag"));
    assert_eq!(in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn aborted_jobs_are_no_longer_counted_in_flight() {
    let (dispatcher, consumer, _transport) = start(1);
    let in_flight = Arc::clone(&consumer.in_flight);

    dispatcher
        .submit(ResolutionJob::new(ChatRef(9), "https://w.test/share/slow"))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(in_flight.load(Ordering::SeqCst), 1);

    consumer.shutdown(Duration::from_millis(100)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(in_flight.load(Ordering::SeqCst), 0);
}
