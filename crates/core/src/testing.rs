//! Testing infrastructure for pw-chat.
//!
//! Provides an in-memory [`PageDriver`] and [`SessionFactory`] so the chat
//! flow can be exercised without spawning a browser.
//!
//! [`MockPage`] keeps a set of "rendered" elements keyed by selector. Tests
//! arrange the page with [`show`](MockPage::show) / [`hide`](MockPage::hide),
//! script failures with [`fail`](MockPage::fail), and make the page evolve
//! with [`on`](MockPage::on): a reaction fires once when its trigger happens
//! (a click, a key press, a navigation, or an element being observed).
//! Every action that succeeds is recorded for later assertions.
//!
//! # Example
//!
//! ```ignore
//! use pw_chat::testing::{MockEffect, MockPage, MockTrigger};
//!
//! let page = MockPage::new();
//! page.show(&input, [""]);
//! page.on(MockTrigger::press(&input, "Enter"), [MockEffect::show(&stop)]);
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::driver::{ElementRef, PageDriver, WaitUntil};
use crate::error::{ChatError, Result};
use crate::locator::Selector;
use crate::session::{BrowserSession, SessionFactory};

/// Action recorded by [`MockPage`] for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockAction {
	Navigate { url: String, wait_until: WaitUntil },
	NetworkIdle,
	Click { selector: String, index: usize },
	Fill { selector: String, index: usize, text: String },
	Press { selector: String, key: String },
	Pause { duration: Duration },
}

/// Operations that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
	Navigate,
	NetworkIdle,
	WaitFor,
	Query,
	Click,
	Fill,
	Press,
	ReadText,
}

impl MockOp {
	fn name(self) -> &'static str {
		match self {
			MockOp::Navigate => "navigate",
			MockOp::NetworkIdle => "network idle",
			MockOp::WaitFor => "wait",
			MockOp::Query => "query",
			MockOp::Click => "click",
			MockOp::Fill => "fill",
			MockOp::Press => "press",
			MockOp::ReadText => "read text",
		}
	}
}

/// Failure flavour for [`MockPage::fail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
	/// Timeout for waits, interaction failure otherwise.
	Transient,
	/// Driver-level failure that must not be retried.
	Fatal,
	/// The page navigated away while the call was in flight.
	ContextLost,
}

/// Event that fires a reaction registered with [`MockPage::on`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockTrigger {
	Click { selector: String },
	Press { selector: String, key: String },
	Navigate { url: String },
	/// A wait, count or query found at least one match.
	Observed { selector: String },
}

impl MockTrigger {
	pub fn click(selector: &Selector) -> Self {
		MockTrigger::Click {
			selector: selector.to_string(),
		}
	}

	pub fn press(selector: &Selector, key: &str) -> Self {
		MockTrigger::Press {
			selector: selector.to_string(),
			key: key.to_string(),
		}
	}

	pub fn navigate(url: &str) -> Self {
		MockTrigger::Navigate { url: url.to_string() }
	}

	pub fn observed(selector: &Selector) -> Self {
		MockTrigger::Observed {
			selector: selector.to_string(),
		}
	}
}

/// Page mutation applied when a reaction fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEffect {
	Show { selector: String, texts: Vec<String> },
	Append { selector: String, text: String },
	Hide { selector: String },
}

impl MockEffect {
	/// Renders a single element with no text.
	pub fn show(selector: &Selector) -> Self {
		MockEffect::Show {
			selector: selector.to_string(),
			texts: vec![String::new()],
		}
	}

	pub fn append(selector: &Selector, text: &str) -> Self {
		MockEffect::Append {
			selector: selector.to_string(),
			text: text.to_string(),
		}
	}

	pub fn hide(selector: &Selector) -> Self {
		MockEffect::Hide {
			selector: selector.to_string(),
		}
	}
}

struct ScriptedFailure {
	op: MockOp,
	target: String,
	skip: usize,
	remaining: usize,
	kind: MockFailure,
}

struct Reaction {
	trigger: MockTrigger,
	effects: Vec<MockEffect>,
	fired: bool,
}

#[derive(Default)]
struct MockState {
	url: String,
	elements: HashMap<String, Vec<String>>,
	failures: Vec<ScriptedFailure>,
	reactions: Vec<Reaction>,
	actions: Vec<MockAction>,
}

impl MockState {
	fn take_failure(&mut self, op: MockOp, target: &str) -> Option<ChatError> {
		let failure = self
			.failures
			.iter_mut()
			.find(|f| f.op == op && f.target == target && f.remaining > 0)?;
		if failure.skip > 0 {
			failure.skip -= 1;
			return None;
		}
		failure.remaining -= 1;

		Some(match (failure.kind, op) {
			(MockFailure::Fatal, _) => ChatError::Driver(format!("scripted {} failure on {target}", op.name())),
			(MockFailure::ContextLost, _) => ChatError::ContextLost(format!("scripted {} failure on {target}", op.name())),
			(MockFailure::Transient, MockOp::WaitFor) => ChatError::timeout(target, Duration::ZERO),
			(MockFailure::Transient, MockOp::Navigate) => ChatError::Navigation {
				url: target.to_string(),
				message: "scripted failure".into(),
			},
			(MockFailure::Transient, _) => ChatError::interaction(op.name(), target, "scripted failure"),
		})
	}

	fn count(&self, key: &str) -> usize {
		self.elements.get(key).map_or(0, Vec::len)
	}

	fn fire(&mut self, trigger: &MockTrigger) {
		let mut effects = Vec::new();
		for reaction in self.reactions.iter_mut().filter(|r| !r.fired && &r.trigger == trigger) {
			reaction.fired = true;
			effects.extend(reaction.effects.iter().cloned());
		}
		for effect in effects {
			self.apply(effect);
		}
	}

	fn observe(&mut self, key: &str) {
		if self.count(key) > 0 {
			self.fire(&MockTrigger::Observed { selector: key.to_string() });
		}
	}

	fn apply(&mut self, effect: MockEffect) {
		match effect {
			MockEffect::Show { selector, texts } => {
				self.elements.insert(selector, texts);
			}
			MockEffect::Append { selector, text } => {
				self.elements.entry(selector).or_default().push(text);
			}
			MockEffect::Hide { selector } => {
				self.elements.remove(&selector);
			}
		}
	}

	fn require(&self, op: MockOp, element: &ElementRef) -> Result<()> {
		let key = element.selector.to_string();
		if self.count(&key) > element.index {
			Ok(())
		} else {
			Err(ChatError::interaction(op.name(), element, "element not rendered"))
		}
	}
}

/// In-memory page for testing the chat flow without a browser.
pub struct MockPage {
	state: Mutex<MockState>,
}

impl Default for MockPage {
	fn default() -> Self {
		Self::new()
	}
}

impl MockPage {
	/// Creates an empty page at `about:blank`.
	pub fn new() -> Self {
		Self {
			state: Mutex::new(MockState {
				url: "about:blank".to_string(),
				..Default::default()
			}),
		}
	}

	/// Renders one element per entry of `texts` for `selector`, replacing earlier ones.
	pub fn show<I, S>(&self, selector: &Selector, texts: I)
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let texts = texts.into_iter().map(Into::into).collect();
		self.state.lock().elements.insert(selector.to_string(), texts);
	}

	pub fn hide(&self, selector: &Selector) {
		self.state.lock().elements.remove(&selector.to_string());
	}

	/// Makes the next `times` `op` calls on `target` fail.
	///
	/// `target` is the selector's display form, or the URL for navigation.
	/// Network-idle failures use an empty target.
	pub fn fail(&self, op: MockOp, target: impl ToString, times: usize, kind: MockFailure) {
		self.fail_after(op, target, 0, times, kind);
	}

	/// Like [`fail`](Self::fail), but lets the first `skip` calls succeed.
	pub fn fail_after(&self, op: MockOp, target: impl ToString, skip: usize, times: usize, kind: MockFailure) {
		self.state.lock().failures.push(ScriptedFailure {
			op,
			target: target.to_string(),
			skip,
			remaining: times,
			kind,
		});
	}

	pub fn fail_network_idle(&self, times: usize) {
		self.fail(MockOp::NetworkIdle, "", times, MockFailure::Transient);
	}

	/// Registers one-shot `effects` applied when `trigger` happens.
	pub fn on<I>(&self, trigger: MockTrigger, effects: I)
	where
		I: IntoIterator<Item = MockEffect>,
	{
		self.state.lock().reactions.push(Reaction {
			trigger,
			effects: effects.into_iter().collect(),
			fired: false,
		});
	}

	pub fn url(&self) -> String {
		self.state.lock().url.clone()
	}

	/// Returns all recorded actions.
	pub fn actions(&self) -> Vec<MockAction> {
		self.state.lock().actions.clone()
	}

	/// Recorded fills, as `(selector, text)` pairs.
	pub fn fills(&self) -> Vec<(String, String)> {
		self.actions()
			.into_iter()
			.filter_map(|a| match a {
				MockAction::Fill { selector, text, .. } => Some((selector, text)),
				_ => None,
			})
			.collect()
	}

	/// Recorded clicks on `selector`.
	pub fn clicks_on(&self, selector: &Selector) -> usize {
		let key = selector.to_string();
		self.actions()
			.iter()
			.filter(|a| matches!(a, MockAction::Click { selector, .. } if *selector == key))
			.count()
	}
}

#[async_trait]
impl PageDriver for MockPage {
	async fn navigate(&self, url: &str, wait_until: WaitUntil, _timeout: Duration) -> Result<()> {
		let mut state = self.state.lock();
		if let Some(err) = state.take_failure(MockOp::Navigate, url) {
			return Err(err);
		}
		state.url = url.to_string();
		state.actions.push(MockAction::Navigate {
			url: url.to_string(),
			wait_until,
		});
		state.fire(&MockTrigger::navigate(url));
		Ok(())
	}

	async fn wait_for_network_idle(&self, _timeout: Duration) -> Result<()> {
		let mut state = self.state.lock();
		if let Some(err) = state.take_failure(MockOp::NetworkIdle, "") {
			return Err(err);
		}
		state.actions.push(MockAction::NetworkIdle);
		Ok(())
	}

	async fn wait_for_element(&self, selector: &Selector, timeout: Duration) -> Result<ElementRef> {
		let key = selector.to_string();
		let mut state = self.state.lock();
		if let Some(err) = state.take_failure(MockOp::WaitFor, &key) {
			return Err(err);
		}
		if state.count(&key) == 0 {
			return Err(ChatError::timeout(key, timeout));
		}
		state.observe(&key);
		Ok(ElementRef::first(selector.clone()))
	}

	async fn query_all(&self, selector: &Selector) -> Result<Vec<ElementRef>> {
		let key = selector.to_string();
		let mut state = self.state.lock();
		if let Some(err) = state.take_failure(MockOp::Query, &key) {
			return Err(err);
		}
		let found = state.count(&key);
		state.observe(&key);
		Ok((0..found).map(|i| ElementRef::new(selector.clone(), i)).collect())
	}

	async fn count(&self, selector: &Selector) -> Result<usize> {
		let key = selector.to_string();
		let mut state = self.state.lock();
		if let Some(err) = state.take_failure(MockOp::Query, &key) {
			return Err(err);
		}
		let found = state.count(&key);
		state.observe(&key);
		Ok(found)
	}

	async fn click(&self, selector: &Selector, timeout: Duration) -> Result<()> {
		let element = self.wait_for_element(selector, timeout).await?;
		self.click_element(&element, timeout).await
	}

	async fn click_element(&self, element: &ElementRef, _timeout: Duration) -> Result<()> {
		let key = element.selector.to_string();
		let mut state = self.state.lock();
		if let Some(err) = state.take_failure(MockOp::Click, &key) {
			return Err(err);
		}
		state.require(MockOp::Click, element)?;
		state.actions.push(MockAction::Click {
			selector: key.clone(),
			index: element.index,
		});
		state.fire(&MockTrigger::Click { selector: key });
		Ok(())
	}

	async fn fill(&self, selector: &Selector, text: &str, timeout: Duration) -> Result<()> {
		let element = self.wait_for_element(selector, timeout).await?;
		self.fill_element(&element, text).await
	}

	async fn fill_element(&self, element: &ElementRef, text: &str) -> Result<()> {
		let key = element.selector.to_string();
		let mut state = self.state.lock();
		if let Some(err) = state.take_failure(MockOp::Fill, &key) {
			return Err(err);
		}
		state.require(MockOp::Fill, element)?;
		state.actions.push(MockAction::Fill {
			selector: key,
			index: element.index,
			text: text.to_string(),
		});
		Ok(())
	}

	async fn press(&self, selector: &Selector, key: &str, timeout: Duration) -> Result<()> {
		let element = self.wait_for_element(selector, timeout).await?;
		let target = element.selector.to_string();
		let mut state = self.state.lock();
		if let Some(err) = state.take_failure(MockOp::Press, &target) {
			return Err(err);
		}
		state.actions.push(MockAction::Press {
			selector: target.clone(),
			key: key.to_string(),
		});
		state.fire(&MockTrigger::Press {
			selector: target,
			key: key.to_string(),
		});
		Ok(())
	}

	async fn read_text(&self, element: &ElementRef) -> Result<String> {
		let key = element.selector.to_string();
		let mut state = self.state.lock();
		if let Some(err) = state.take_failure(MockOp::ReadText, &key) {
			return Err(err);
		}
		state.require(MockOp::ReadText, element)?;
		Ok(state.elements.get(&key).and_then(|texts| texts.get(element.index)).cloned().unwrap_or_default())
	}

	async fn pause(&self, duration: Duration) {
		self.state.lock().actions.push(MockAction::Pause { duration });
	}
}

/// Session handed out by [`MockSessionFactory`].
pub struct MockSession {
	page: Arc<MockPage>,
	released: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserSession for MockSession {
	fn page(&self) -> &dyn PageDriver {
		self.page.as_ref()
	}

	async fn release(self: Box<Self>) -> Result<()> {
		self.released.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}
}

/// Factory sharing one [`MockPage`] across acquisitions and counting releases.
pub struct MockSessionFactory {
	page: Arc<MockPage>,
	acquired: AtomicUsize,
	released: Arc<AtomicUsize>,
	fail_acquire: bool,
}

impl MockSessionFactory {
	pub fn new(page: MockPage) -> Self {
		Self {
			page: Arc::new(page),
			acquired: AtomicUsize::new(0),
			released: Arc::new(AtomicUsize::new(0)),
			fail_acquire: false,
		}
	}

	/// Factory whose `acquire` always fails, as when the browser cannot launch.
	pub fn failing() -> Self {
		Self {
			fail_acquire: true,
			..Self::new(MockPage::new())
		}
	}

	pub fn page(&self) -> &MockPage {
		&self.page
	}

	pub fn acquired(&self) -> usize {
		self.acquired.load(Ordering::SeqCst)
	}

	pub fn released(&self) -> usize {
		self.released.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl SessionFactory for MockSessionFactory {
	async fn acquire(&self) -> Result<Box<dyn BrowserSession>> {
		if self.fail_acquire {
			return Err(ChatError::Session("scripted launch failure".into()));
		}
		self.acquired.fetch_add(1, Ordering::SeqCst);
		Ok(Box::new(MockSession {
			page: Arc::clone(&self.page),
			released: Arc::clone(&self.released),
		}))
	}
}
