use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::network::{
	EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent, ResourceType,
};
use futures::StreamExt;
use parking_lot::Mutex;
use pw_chat::{ChatError, Result};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

enum NetEvent {
	Started(String),
	Ended(String),
}

#[derive(Debug)]
struct Inflight {
	pending: HashSet<String>,
	last_change: Instant,
}

/// Requests the tab currently has in flight, fed from CDP network events.
///
/// Streaming connections (`EventSource`) are never counted, since they stay
/// open for the life of the page.
#[derive(Debug)]
pub struct NetworkTracker {
	inner: Mutex<Inflight>,
}

impl NetworkTracker {
	pub fn new(now: Instant) -> Self {
		Self {
			inner: Mutex::new(Inflight {
				pending: HashSet::new(),
				last_change: now,
			}),
		}
	}

	/// Subscribes to `page`'s network events and keeps a tracker current.
	///
	/// The task ends when the connection to the tab closes.
	pub async fn attach(page: &Page) -> Result<(Arc<Self>, JoinHandle<()>)> {
		let listen_err =
			|e: chromiumoxide::error::CdpError| ChatError::Session(format!("cannot subscribe to network events: {e}"));
		let sent = page.event_listener::<EventRequestWillBeSent>().await.map_err(listen_err)?;
		let finished = page.event_listener::<EventLoadingFinished>().await.map_err(listen_err)?;
		let failed = page.event_listener::<EventLoadingFailed>().await.map_err(listen_err)?;

		let sent = sent.filter_map(|e| async move {
			(e.r#type != Some(ResourceType::EventSource)).then(|| NetEvent::Started(e.request_id.inner().clone()))
		});
		let finished = finished.map(|e| NetEvent::Ended(e.request_id.inner().clone()));
		let failed = failed.map(|e| NetEvent::Ended(e.request_id.inner().clone()));

		let tracker = Arc::new(Self::new(Instant::now()));
		let sink = Arc::clone(&tracker);
		let task = tokio::spawn(async move {
			let mut events = std::pin::pin!(futures::stream::select(sent, futures::stream::select(finished, failed)));
			while let Some(event) = events.next().await {
				let now = Instant::now();
				match event {
					NetEvent::Started(id) => sink.started(id, now),
					NetEvent::Ended(id) => sink.ended(&id, now),
				}
			}
			trace!(target = "pw-chat", "network event stream closed");
		});
		Ok((tracker, task))
	}

	pub fn started(&self, id: String, at: Instant) {
		let mut inner = self.inner.lock();
		// Redirects reuse the request id.
		inner.pending.insert(id);
		inner.last_change = at;
	}

	/// Unknown ids (requests issued before the subscription) are ignored.
	pub fn ended(&self, id: &str, at: Instant) {
		let mut inner = self.inner.lock();
		if inner.pending.remove(id) {
			inner.last_change = at;
		}
	}

	pub fn in_flight(&self) -> usize {
		self.inner.lock().pending.len()
	}

	/// No request in flight, and none started or finished within `window` of `now`.
	pub fn is_quiet(&self, now: Instant, window: Duration) -> bool {
		let inner = self.inner.lock();
		inner.pending.is_empty() && now.saturating_duration_since(inner.last_change) >= window
	}
}
