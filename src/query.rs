//! Async query state machine for driving fetches from an interactive loop.
//!
//! A `Query<T>` owns the fetching closure and the Idle/Loading/Success/
//! Error state the display reads. Results arrive through a oneshot channel
//! polled from the event loop. Starting a new fetch with `refetch()` drops
//! the previous channel receiver, so a superseded in-flight fetch can
//! never overwrite newer state: last write wins by cancellation.
//!
//! # Example
//!
//! ```ignore
//! let provider = provider.clone();
//! let mut query = Query::new(move || {
//!     let provider = provider.clone();
//!     let params = params.clone();
//!     async move { provider.search(&params).await.map_err(|e| e.to_string()) }
//! });
//!
//! query.fetch();
//! // in the event loop tick:
//! if query.poll() {
//!     // state changed, re-render
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use tokio::sync::oneshot;

/// The state of a query.
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Not started
  Idle,
  /// Fetch in flight
  Loading,
  /// Completed successfully
  Success(T),
  /// Failed with a display-ready message
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;
type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

/// Async fetch with owned state, polled from an event loop.
pub struct Query<T> {
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  receiver: Option<oneshot::Receiver<Result<T, String>>>,
}

impl<T: Send + 'static> Query<T> {
  /// Create a query around a fetcher closure. The closure is invoked anew
  /// on every `fetch()`/`refetch()`.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      fetcher: Box::new(move || Box::pin(fetcher())),
      receiver: None,
    }
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  /// Start fetching unless a fetch is already in flight.
  pub fn fetch(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.start_fetch();
  }

  /// Start a fresh fetch, abandoning any in-flight one.
  ///
  /// The previous receiver is dropped, so whatever the superseded fetch
  /// eventually produces is discarded unseen.
  pub fn refetch(&mut self) {
    self.receiver = None;
    self.start_fetch();
  }

  /// Poll for a result. Returns `true` when the state changed.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(Ok(data)) => {
        self.state = QueryState::Success(data);
        self.receiver = None;
        true
      }
      Ok(Err(error)) => {
        self.state = QueryState::Error(error);
        self.receiver = None;
        true
      }
      Err(oneshot::error::TryRecvError::Empty) => false,
      Err(oneshot::error::TryRecvError::Closed) => {
        // sender dropped without sending
        self.state = QueryState::Error("query was cancelled".to_string());
        self.receiver = None;
        true
      }
    }
  }

  fn start_fetch(&mut self) {
    let (tx, rx) = oneshot::channel();
    self.receiver = Some(rx);
    self.state = QueryState::Loading;

    let future = (self.fetcher)();
    tokio::spawn(async move {
      let result = future.await;
      // receiver may have been dropped by a refetch
      let _ = tx.send(result);
    });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}
