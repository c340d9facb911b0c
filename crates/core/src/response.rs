//! Detecting the end of a streamed reply and reading it back.
//!
//! Completion is observed through an affordance transition: a "stop" control
//! shows up while the reply streams and is replaced by the "send" control once
//! the reply is done. Both phases share the same budget, re-armed per phase.
//!
//! A reply can finish before the first poll ever sees the stop control. While
//! waiting for streaming to start, the waiter therefore also accepts a settled
//! page: more reply blocks than before submission, the send control back, and
//! no stop control.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::ChatConfig;
use crate::driver::PageDriver;
use crate::error::{ChatError, Result};
use crate::locator::LocatorKey;

/// How the end of a reply was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
	/// Streaming was observed and then ended.
	Streamed,
	/// The reply was already complete before streaming could be observed.
	Settled,
}

/// The reply of a run. Produced once, never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseResult {
	pub text: String,
	pub completion: Completion,
}

pub struct ResponseWaiter<'a> {
	config: &'a ChatConfig,
}

impl<'a> ResponseWaiter<'a> {
	pub fn new(config: &'a ChatConfig) -> Self {
		Self { config }
	}

	/// Blocks until the reply started after `baseline` reply blocks has finished.
	pub async fn await_completion(&self, page: &dyn PageDriver, budget: Duration, baseline: usize) -> Result<Completion> {
		info!(target = "pw-chat", budget_ms = budget.as_millis() as u64, "waiting for response");

		let streaming = &self.config.locators.get(LocatorKey::Streaming).selector;
		let ready = &self.config.locators.get(LocatorKey::Ready).selector;
		let replies = &self.config.locators.get(LocatorKey::Responses).selector;
		let poll = self.config.timeouts.poll_interval;

		let deadline = Instant::now() + budget;
		loop {
			if page.count(streaming).await? > 0 {
				debug!(target = "pw-chat", "streaming started");
				break;
			}
			if page.count(replies).await? > baseline && page.count(ready).await? > 0 && page.count(streaming).await? == 0 {
				info!(target = "pw-chat", "reply settled before streaming was observed");
				return Ok(Completion::Settled);
			}
			if Instant::now() >= deadline {
				return Err(ChatError::timeout(streaming.to_string(), budget));
			}
			tokio::time::sleep(poll).await;
		}

		let deadline = Instant::now() + budget;
		loop {
			if page.count(streaming).await? == 0 && page.count(ready).await? > 0 {
				info!(target = "pw-chat", "response wait over");
				return Ok(Completion::Streamed);
			}
			if Instant::now() >= deadline {
				return Err(ChatError::timeout(ready.to_string(), budget));
			}
			tokio::time::sleep(poll).await;
		}
	}
}

pub struct ResponseExtractor<'a> {
	config: &'a ChatConfig,
}

impl<'a> ResponseExtractor<'a> {
	pub fn new(config: &'a ChatConfig) -> Self {
		Self { config }
	}

	/// Text of the last rendered reply block, in document order.
	pub async fn extract_latest(&self, page: &dyn PageDriver) -> Result<String> {
		let replies = self.config.locators.get(LocatorKey::Responses);
		page.wait_for_element(&replies.selector, replies.timeout).await?;

		let blocks = page.query_all(&replies.selector).await?;
		let Some(last) = blocks.last() else {
			return Err(ChatError::NoResponse {
				selector: replies.selector.to_string(),
			});
		};

		debug!(target = "pw-chat", blocks = blocks.len(), "reading latest reply");
		page.read_text(last).await
	}
}
