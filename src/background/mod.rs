//! Background rating service.
//!
//! A single tokio task owns the rating cache, the Goodreads client and the
//! server sink. Page processing talks to it through a cloneable
//! [`RatingBridge`], one request and one oneshot reply per listing.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::app::{BookrateError, Result};
use crate::cache::RatingCache;
use crate::domain::{BookData, BookPostBody, FetchRatingRequest, Message, RatingResponse};
use crate::goodreads::GoodreadsClient;
use crate::sync::BookSink;

/// Envelope carried over the service channel
#[derive(Debug)]
enum ServiceMessage {
    Request {
        message: Message,
        reply: oneshot::Sender<RatingResponse>,
    },
    Shutdown,
}

/// Handle to send rating requests to the background service
#[derive(Clone)]
pub struct RatingBridge {
    tx: mpsc::Sender<ServiceMessage>,
}

impl RatingBridge {
    /// Send a message and wait for the reply
    pub async fn send(&self, message: Message) -> Result<RatingResponse> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ServiceMessage::Request { message, reply })
            .await
            .map_err(|e| BookrateError::Channel(e.to_string()))?;
        rx.await.map_err(|e| BookrateError::Channel(e.to_string()))
    }

    pub async fn fetch_rating(&self, book: &BookData) -> Result<RatingResponse> {
        self.send(Message::FetchRatingWithBookTitle(
            FetchRatingRequest::from_book(book),
        ))
        .await
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(ServiceMessage::Shutdown).await;
    }
}

pub struct RatingService {
    cache: Arc<RatingCache>,
    goodreads: GoodreadsClient,
    sink: Arc<dyn BookSink>,
    clean_on_start: bool,
    rx: mpsc::Receiver<ServiceMessage>,
}

impl RatingService {
    pub fn new(
        cache: Arc<RatingCache>,
        goodreads: GoodreadsClient,
        sink: Arc<dyn BookSink>,
        clean_on_start: bool,
    ) -> (Self, RatingBridge) {
        let (tx, rx) = mpsc::channel(100);
        let bridge = RatingBridge { tx };
        let service = Self {
            cache,
            goodreads,
            sink,
            clean_on_start,
            rx,
        };
        (service, bridge)
    }

    pub async fn run(mut self) {
        info!("Rating service started");

        if self.clean_on_start {
            match self.cache.clean() {
                Ok(removed) => info!("Cache cleaning removed {} entries", removed.len()),
                Err(e) => error!("Cache cleaning failed: {}", e),
            }
        }

        while let Some(msg) = self.rx.recv().await {
            match msg {
                ServiceMessage::Request { message, reply } => {
                    let Message::FetchRatingWithBookTitle(request) = message;
                    self.handle_fetch_rating(request, reply).await;
                }
                ServiceMessage::Shutdown => {
                    info!("Rating service shutting down");
                    break;
                }
            }
        }
    }

    async fn handle_fetch_rating(
        &self,
        request: FetchRatingRequest,
        reply: oneshot::Sender<RatingResponse>,
    ) {
        info!("FETCH_RATING_WITH_BOOK_TITLE {}", request.title);
        let storage_key = request.storage_key();

        let stored = match self.cache.get(&storage_key) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Cache read failed for {}: {}", storage_key, e);
                None
            }
        };
        let was_cached = stored.is_some();

        match stored {
            Some(stored) => {
                debug!("Found stored rating for {}", storage_key);
                if reply.send(stored).is_err() {
                    debug!("Requester for {} went away", storage_key);
                }
            }
            None => {
                let response = self.lookup(&request).await;
                let answer = response.clone().unwrap_or_else(RatingResponse::not_found);
                if reply.send(answer).is_err() {
                    debug!("Requester for {} went away", storage_key);
                }

                if let Some(response) = response {
                    let mut goodreads = response;
                    goodreads.title = Some(request.title.clone());
                    goodreads.subtitle = request.subtitle.clone();
                    self.sync(BookPostBody::goodreads(goodreads)).await;
                }
            }
        }

        // Listings are resent for new books, or when they carry data worth refreshing
        if let Some(book) = request.book.as_ref() {
            if !was_cached || book.isbn.is_some() || book.rating.is_some() {
                match BookPostBody::listing(book.clone()) {
                    Some(body) => self.sync(body).await,
                    None => debug!("Listing {} has no source, not synced", book.title),
                }
            }
        }
    }

    /// Search Goodreads and cache the result; `None` when the search itself failed
    async fn lookup(&self, request: &FetchRatingRequest) -> Option<RatingResponse> {
        info!("Search Goodreads: {}", request.storage_key());
        let response = match self
            .goodreads
            .search(&request.title, request.subtitle.as_deref())
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Goodreads lookup for {} failed: {}", request.title, e);
                return None;
            }
        };

        let cached = response.clone().with_timestamp(Utc::now().timestamp_millis());
        for key in [request.storage_key(), request.title.clone()] {
            if let Err(e) = self.cache.set(&key, &cached) {
                warn!("Failed to cache rating for {}: {}", key, e);
            }
        }

        Some(response)
    }

    async fn sync(&self, body: BookPostBody) {
        if let Err(e) = self.sink.send(&body).await {
            warn!(
                "Failed to sync {} to server: {}",
                body.first_title().unwrap_or("<untitled>"),
                e
            );
        }
    }
}

/// Spawn the rating service as a tokio task
pub fn spawn_rating_service(
    cache: Arc<RatingCache>,
    goodreads: GoodreadsClient,
    sink: Arc<dyn BookSink>,
    clean_on_start: bool,
) -> (RatingBridge, JoinHandle<()>) {
    let (service, bridge) = RatingService::new(cache, goodreads, sink, clean_on_start);

    let handle = tokio::spawn(async move {
        service.run().await;
    });

    (bridge, handle)
}
