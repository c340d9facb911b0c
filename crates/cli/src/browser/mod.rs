//! Chromium backend for the chat flow, driven over CDP.

mod network;
mod page;
mod session;
mod viewport;

pub use network::NetworkTracker;
pub use page::ChromePage;
pub use session::{ChromeSession, ChromeSessionFactory};
pub use viewport::{FixedViewport, ViewportProvider};
