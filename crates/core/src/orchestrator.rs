//! One prompt/reply run against a fresh browser session.

use tracing::{error, info, warn};

use crate::auth::SessionAuthenticator;
use crate::config::ChatConfig;
use crate::conversation::{ConversationOutcome, ConversationSelector};
use crate::driver::{PageDriver, WaitUntil};
use crate::error::Result;
use crate::prompt::PromptSubmitter;
use crate::response::{ResponseExtractor, ResponseResult};
use crate::session::SessionFactory;

/// Drives a run end to end: navigate, authenticate, optionally resume a
/// conversation, submit, wait, extract.
///
/// The orchestrator owns its configuration and never retries a whole run.
pub struct Orchestrator<F> {
	config: ChatConfig,
	factory: F,
}

impl<F: SessionFactory> Orchestrator<F> {
	pub fn new(config: ChatConfig, factory: F) -> Self {
		Self { config, factory }
	}

	pub fn config(&self) -> &ChatConfig {
		&self.config
	}

	pub fn factory(&self) -> &F {
		&self.factory
	}

	/// Sends `prompt` and returns the assistant's reply.
	///
	/// The session acquired for the run is released exactly once whatever the
	/// outcome. A failed release is logged and does not mask the run's result.
	pub async fn run(&self, prompt: &str, conversation: Option<&str>) -> Result<ResponseResult> {
		let session = self.factory.acquire().await?;
		let outcome = self.drive(session.page(), prompt, conversation).await;

		if let Err(err) = session.release().await {
			error!(target = "pw-chat", error = %err, "failed to release browser session");
		}
		outcome
	}

	async fn drive(&self, page: &dyn PageDriver, prompt: &str, conversation: Option<&str>) -> Result<ResponseResult> {
		let cfg = &self.config;

		info!(target = "pw-chat", url = %cfg.target_url, "opening chat");
		page.navigate(&cfg.target_url, WaitUntil::DomContentLoaded, cfg.timeouts.navigation)
			.await?;
		page.wait_for_network_idle(cfg.timeouts.initial_idle).await?;

		SessionAuthenticator::new(cfg).ensure_authenticated(page).await?;

		if let Some(name) = conversation {
			if ConversationSelector::new(cfg).select(page, name).await? == ConversationOutcome::NotFound {
				warn!(target = "pw-chat", conversation = %name, "continuing in the active conversation");
			}
		}

		let completion = PromptSubmitter::new(cfg).submit(page, prompt).await?;
		page.pause(cfg.timeouts.settle).await;

		let text = ResponseExtractor::new(cfg).extract_latest(page).await?;
		info!(target = "pw-chat", chars = text.chars().count(), ?completion, "reply extracted");
		Ok(ResponseResult { text, completion })
	}
}
