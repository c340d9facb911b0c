use std::io;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use pw_chat::{BrowserSession, ChatError, PageDriver, Result, SessionFactory};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::network::NetworkTracker;
use super::page::ChromePage;
use super::viewport::ViewportProvider;
use crate::settings::LaunchSettings;

const HANDLER_JOIN_TIMEOUT: Duration = Duration::from_secs(5);
const PROCESS_EXIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Launches a Chromium instance on a persistent profile for each run.
pub struct ChromeSessionFactory {
	launch: LaunchSettings,
	viewport: Box<dyn ViewportProvider>,
}

impl ChromeSessionFactory {
	pub fn new(launch: LaunchSettings, viewport: impl ViewportProvider + 'static) -> Self {
		Self {
			launch,
			viewport: Box::new(viewport),
		}
	}

	fn browser_config(&self) -> Result<BrowserConfig> {
		let size = self.viewport.window_size();
		let mut builder = BrowserConfig::builder()
			.user_data_dir(&self.launch.profile_dir)
			.window_size(size.width, size.height)
			.viewport(None);
		if !self.launch.headless {
			builder = builder.with_head();
		}
		builder.build().map_err(ChatError::Session)
	}
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
	async fn acquire(&self) -> Result<Box<dyn BrowserSession>> {
		let profile = &self.launch.profile_dir;
		tokio::fs::create_dir_all(profile)
			.await
			.map_err(|e| ChatError::Session(format!("cannot create profile dir {}: {e}", profile.display())))?;

		let config = self.browser_config()?;
		info!(
			target = "pw-chat",
			profile = %profile.display(),
			headless = self.launch.headless,
			"launching browser"
		);

		let (browser, mut handler) = Browser::launch(config)
			.await
			.map_err(|e| ChatError::Session(format!("browser launch failed: {e}")))?;

		let handler_task = tokio::spawn(async move {
			while let Some(event) = handler.next().await {
				if let Err(err) = event {
					debug!(target = "pw-chat", error = %err, "cdp handler error");
				}
			}
		});

		let existing = match browser.pages().await {
			Ok(pages) => pages.into_iter().next(),
			Err(err) => {
				debug!(target = "pw-chat", error = %err, "could not list tabs");
				None
			}
		};
		let page = match existing {
			Some(page) => {
				debug!(target = "pw-chat", "reusing existing tab");
				Ok(page)
			}
			None => browser
				.new_page("about:blank")
				.await
				.map_err(|e| ChatError::Session(format!("cannot open tab: {e}"))),
		};
		let attached = match page {
			Ok(page) => NetworkTracker::attach(&page).await.map(|(network, task)| (page, network, task)),
			Err(err) => Err(err),
		};
		let (page, network, network_task) = match attached {
			Ok(attached) => attached,
			Err(err) => {
				if let Err(close_err) = shutdown(browser, handler_task).await {
					warn!(target = "pw-chat", error = %close_err, "cleanup after failed launch");
				}
				return Err(err);
			}
		};

		Ok(Box::new(ChromeSession {
			browser,
			page: ChromePage::new(page, network),
			handler_task,
			network_task,
		}))
	}
}

/// A launched browser and the tab the run works in.
pub struct ChromeSession {
	browser: Browser,
	page: ChromePage,
	handler_task: JoinHandle<()>,
	network_task: JoinHandle<()>,
}

#[async_trait]
impl BrowserSession for ChromeSession {
	fn page(&self) -> &dyn PageDriver {
		&self.page
	}

	async fn release(self: Box<Self>) -> Result<()> {
		let ChromeSession {
			browser,
			handler_task,
			network_task,
			..
		} = *self;
		network_task.abort();
		shutdown(browser, handler_task).await
	}
}

/// Closes the browser, reaps the process and joins the CDP handler.
async fn shutdown(mut browser: Browser, handler_task: JoinHandle<()>) -> Result<()> {
	debug!(target = "pw-chat", "closing browser");
	let closed = browser.close().await.map(|_| ());
	let reaped = reap(browser.wait(), PROCESS_EXIT_TIMEOUT).await;
	match reaped {
		Reaped::Exited => {}
		Reaped::Failed(err) => warn!(target = "pw-chat", error = %err, "browser process did not exit cleanly"),
		Reaped::TimedOut => {
			warn!(target = "pw-chat", "browser process still running after close, killing it");
			if let Some(Err(err)) = browser.kill().await {
				warn!(target = "pw-chat", error = %err, "could not kill browser process");
			}
		}
	}
	// The handler stream ends once the connection drops.
	let mut handler_task = handler_task;
	match tokio::time::timeout(HANDLER_JOIN_TIMEOUT, &mut handler_task).await {
		Ok(Ok(())) => {}
		Ok(Err(err)) => warn!(target = "pw-chat", error = %err, "cdp handler task failed"),
		Err(_) => {
			handler_task.abort();
			warn!(target = "pw-chat", "cdp handler still running after close, aborted");
		}
	}

	closed.map_err(|e| ChatError::Session(format!("browser close failed: {e}")))
}

#[derive(Debug)]
enum Reaped {
	Exited,
	Failed(io::Error),
	TimedOut,
}

/// Waits up to `limit` for the browser process to exit.
async fn reap<T>(wait: impl Future<Output = io::Result<T>>, limit: Duration) -> Reaped {
	match tokio::time::timeout(limit, wait).await {
		Ok(Ok(_)) => Reaped::Exited,
		Ok(Err(err)) => Reaped::Failed(err),
		Err(_) => Reaped::TimedOut,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test(start_paused = true)]
	async fn hung_process_is_reported_after_limit() {
		let started = tokio::time::Instant::now();
		let outcome = reap(std::future::pending::<io::Result<()>>(), PROCESS_EXIT_TIMEOUT).await;
		assert!(matches!(outcome, Reaped::TimedOut));
		assert_eq!(started.elapsed(), PROCESS_EXIT_TIMEOUT);
	}

	#[tokio::test]
	async fn exit_and_wait_errors_are_distinguished() {
		assert!(matches!(reap(async { Ok(()) }, PROCESS_EXIT_TIMEOUT).await, Reaped::Exited));
		let failed = reap(async { Err::<(), _>(io::Error::other("no child")) }, PROCESS_EXIT_TIMEOUT).await;
		assert!(matches!(failed, Reaped::Failed(_)));
	}
}
