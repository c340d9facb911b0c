//! Scoped browser sessions.

use async_trait::async_trait;

use crate::driver::PageDriver;
use crate::error::Result;

/// One automation context bound to its single active page.
#[async_trait]
pub trait BrowserSession: Send + Sync {
	fn page(&self) -> &dyn PageDriver;

	/// Releases browser resources. Called exactly once per acquired session.
	async fn release(self: Box<Self>) -> Result<()>;
}

/// Creates sessions for [`crate::Orchestrator`] runs.
#[async_trait]
pub trait SessionFactory: Send + Sync {
	async fn acquire(&self) -> Result<Box<dyn BrowserSession>>;
}
