//! The browser operations the chat flow consumes.
//!
//! [`PageDriver`] is the seam between the interaction-reliability layer and a
//! concrete automation backend. Every wait takes an explicit timeout and fails
//! with [`ChatError::Timeout`](crate::ChatError::Timeout) when it expires.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::locator::Selector;

/// Navigation completion condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitUntil {
	#[default]
	Load,
	DomContentLoaded,
	NetworkIdle,
}

/// The `index`-th element (document order) currently matching `selector`.
///
/// Resolved lazily by the driver on every use, so a stale reference surfaces
/// as an interaction failure rather than a dangling handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
	pub selector: Selector,
	pub index: usize,
}

impl ElementRef {
	pub fn new(selector: Selector, index: usize) -> Self {
		Self { selector, index }
	}

	pub fn first(selector: Selector) -> Self {
		Self::new(selector, 0)
	}
}

impl fmt::Display for ElementRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} >> nth={}", self.selector, self.index)
	}
}

/// Page operations required from an automation backend.
#[async_trait]
pub trait PageDriver: Send + Sync {
	/// Navigates to `url` and waits for `wait_until`.
	async fn navigate(&self, url: &str, wait_until: WaitUntil, timeout: Duration) -> Result<()>;

	/// Waits until the page has had no network activity for a short quiet window.
	async fn wait_for_network_idle(&self, timeout: Duration) -> Result<()>;

	/// Waits for at least one element matching `selector`.
	async fn wait_for_element(&self, selector: &Selector, timeout: Duration) -> Result<ElementRef>;

	/// All elements currently matching `selector`, in document order. Never waits.
	async fn query_all(&self, selector: &Selector) -> Result<Vec<ElementRef>>;

	/// Number of elements currently matching `selector`. Never waits.
	async fn count(&self, selector: &Selector) -> Result<usize>;

	/// Waits for `selector` and clicks the first match.
	async fn click(&self, selector: &Selector, timeout: Duration) -> Result<()>;

	async fn click_element(&self, element: &ElementRef, timeout: Duration) -> Result<()>;

	/// Waits for `selector` and replaces its content with `text`.
	async fn fill(&self, selector: &Selector, text: &str, timeout: Duration) -> Result<()>;

	async fn fill_element(&self, element: &ElementRef, text: &str) -> Result<()>;

	/// Waits for `selector` and presses `key` (e.g. `"Enter"`) on it.
	async fn press(&self, selector: &Selector, key: &str, timeout: Duration) -> Result<()>;

	/// Rendered text of `element`.
	async fn read_text(&self, element: &ElementRef) -> Result<String>;

	/// Unconditional delay.
	async fn pause(&self, duration: Duration);
}
