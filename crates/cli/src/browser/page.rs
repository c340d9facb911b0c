use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::input::InsertTextParams;
use chromiumoxide::element::Element;
use pw_chat::{ChatError, ElementRef, PageDriver, Result, Selector, WaitUntil};
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::network::NetworkTracker;

/// Interval between presence checks while waiting for an element.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long the tab must go without request activity before the network counts as idle.
const QUIET_WINDOW: Duration = Duration::from_millis(500);

/// Focuses the receiver and selects its current content so inserted text replaces it.
const FOCUS_AND_SELECT: &str = r#"function() {
	this.focus();
	if (typeof this.select === "function") {
		this.select();
		return;
	}
	const range = document.createRange();
	range.selectNodeContents(this);
	const selection = window.getSelection();
	selection.removeAllRanges();
	selection.addRange(range);
}"#;

/// CDP messages for a script whose document was replaced while it ran.
const CONTEXT_LOST_MARKERS: [&str; 3] = [
	"Execution context was destroyed",
	"Cannot find context with specified id",
	"Inspected target navigated or closed",
];

/// Maps a failed `Runtime.evaluate` to a [`ChatError`].
///
/// Losing the execution context is expected right after a click that
/// navigates, so it is reported as retryable [`ChatError::ContextLost`].
fn script_error(message: String) -> ChatError {
	if CONTEXT_LOST_MARKERS.iter().any(|marker| message.contains(marker)) {
		ChatError::ContextLost(message)
	} else {
		ChatError::Driver(message)
	}
}

/// [`PageDriver`] over a single Chromium tab.
///
/// `has-text` filters are applied client-side against `innerText`, with the
/// same whitespace folding and case-insensitivity as [`Selector::matches_text`].
///
/// Network idleness comes from the tab's in-flight requests as reported by
/// a [`NetworkTracker`] attached to the same page.
#[derive(Clone)]
pub struct ChromePage {
	page: Page,
	network: Arc<NetworkTracker>,
}

impl ChromePage {
	pub fn new(page: Page, network: Arc<NetworkTracker>) -> Self {
		Self { page, network }
	}

	async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T> {
		let result = self.page.evaluate(script).await.map_err(|e| script_error(e.to_string()))?;
		result
			.into_value()
			.map_err(|e| ChatError::Driver(format!("unexpected script result: {e}")))
	}

	fn count_script(selector: &Selector) -> String {
		let css = serde_json::Value::from(selector.css_part());
		let text = serde_json::json!(selector.text_filter());
		format!(
			r#"(() => {{
	const norm = (s) => (s || "").replace(/\s+/g, " ").trim().toLowerCase();
	const text = {text};
	return Array.from(document.querySelectorAll({css}))
		.filter((el) => text === null || norm(el.innerText).includes(norm(text)))
		.length;
}})()"#
		)
	}

	/// Re-resolves `element` against the live DOM.
	async fn resolve(&self, element: &ElementRef) -> Result<Element> {
		let candidates = self
			.page
			.find_elements(element.selector.css_part())
			.await
			.map_err(|e| ChatError::interaction("locate", element, e))?;

		let mut seen = 0;
		for candidate in candidates {
			if element.selector.text_filter().is_some() {
				let rendered = candidate
					.inner_text()
					.await
					.map_err(|e| ChatError::interaction("locate", element, e))?
					.unwrap_or_default();
				if !element.selector.matches_text(&rendered) {
					continue;
				}
			}
			if seen == element.index {
				return Ok(candidate);
			}
			seen += 1;
		}

		Err(ChatError::interaction("locate", element, "element not rendered"))
	}
}

#[async_trait]
impl PageDriver for ChromePage {
	async fn navigate(&self, url: &str, wait_until: WaitUntil, timeout: Duration) -> Result<()> {
		debug!(target = "pw-chat", url, ?wait_until, "navigating");
		// goto resolves on the load event, which also covers DOMContentLoaded.
		let goto = self.page.goto(url);
		match tokio::time::timeout(timeout, goto).await {
			Ok(Ok(_)) => {}
			Ok(Err(err)) => {
				return Err(ChatError::Navigation {
					url: url.to_string(),
					message: err.to_string(),
				});
			}
			Err(_) => return Err(ChatError::timeout(format!("navigation to {url}"), timeout)),
		}

		if wait_until == WaitUntil::NetworkIdle {
			self.wait_for_network_idle(timeout).await?;
		}
		Ok(())
	}

	async fn wait_for_network_idle(&self, timeout: Duration) -> Result<()> {
		let deadline = Instant::now() + timeout;
		loop {
			let ready = match self.eval::<String>("document.readyState".to_string()).await {
				Ok(state) => state == "complete",
				Err(err) if err.is_retryable() => {
					trace!(target = "pw-chat", error = %err, "ready state check lost its document");
					false
				}
				Err(err) => return Err(err),
			};
			let now = Instant::now();
			if ready && self.network.is_quiet(now, QUIET_WINDOW) {
				trace!(target = "pw-chat", "network idle");
				return Ok(());
			}

			if now >= deadline {
				debug!(target = "pw-chat", in_flight = self.network.in_flight(), "network never settled");
				return Err(ChatError::timeout("network idle", timeout));
			}
			tokio::time::sleep(POLL_INTERVAL).await;
		}
	}

	async fn wait_for_element(&self, selector: &Selector, timeout: Duration) -> Result<ElementRef> {
		let deadline = Instant::now() + timeout;
		loop {
			match self.count(selector).await {
				Ok(found) if found > 0 => return Ok(ElementRef::first(selector.clone())),
				Ok(_) => {}
				// The document is being replaced; poll the new one.
				Err(err) if err.is_retryable() => {
					trace!(target = "pw-chat", %selector, error = %err, "presence check failed");
				}
				Err(err) => return Err(err),
			}
			if Instant::now() >= deadline {
				return Err(ChatError::timeout(selector.to_string(), timeout));
			}
			tokio::time::sleep(POLL_INTERVAL).await;
		}
	}

	async fn query_all(&self, selector: &Selector) -> Result<Vec<ElementRef>> {
		let found = self.count(selector).await?;
		Ok((0..found).map(|i| ElementRef::new(selector.clone(), i)).collect())
	}

	async fn count(&self, selector: &Selector) -> Result<usize> {
		self.eval(Self::count_script(selector)).await
	}

	async fn click(&self, selector: &Selector, timeout: Duration) -> Result<()> {
		let element = self.wait_for_element(selector, timeout).await?;
		self.click_element(&element, timeout).await
	}

	async fn click_element(&self, element: &ElementRef, timeout: Duration) -> Result<()> {
		let click = async {
			let target = self.resolve(element).await?;
			target
				.click()
				.await
				.map_err(|e| ChatError::interaction("click", element, e))?;
			Ok::<(), ChatError>(())
		};
		tokio::time::timeout(timeout, click)
			.await
			.map_err(|_| ChatError::timeout(element.to_string(), timeout))?
	}

	async fn fill(&self, selector: &Selector, text: &str, timeout: Duration) -> Result<()> {
		let element = self.wait_for_element(selector, timeout).await?;
		self.fill_element(&element, text).await
	}

	async fn fill_element(&self, element: &ElementRef, text: &str) -> Result<()> {
		let target = self.resolve(element).await?;
		target
			.call_js_fn(FOCUS_AND_SELECT, false)
			.await
			.map_err(|e| ChatError::interaction("fill", element, e))?;
		// Inserted text keeps newlines literal instead of submitting the form.
		self.page
			.execute(InsertTextParams::new(text))
			.await
			.map_err(|e| ChatError::interaction("fill", element, e))?;
		Ok(())
	}

	async fn press(&self, selector: &Selector, key: &str, timeout: Duration) -> Result<()> {
		let element = self.wait_for_element(selector, timeout).await?;
		let target = self.resolve(&element).await?;
		target
			.press_key(key)
			.await
			.map_err(|e| ChatError::interaction("press", &element, e))?;
		Ok(())
	}

	async fn read_text(&self, element: &ElementRef) -> Result<String> {
		let target = self.resolve(element).await?;
		let text = target
			.inner_text()
			.await
			.map_err(|e| ChatError::interaction("read text", element, e))?;
		Ok(text.unwrap_or_default())
	}

	async fn pause(&self, duration: Duration) {
		tokio::time::sleep(duration).await;
	}
}
