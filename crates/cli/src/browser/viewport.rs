use crate::cli::WindowSize;

/// Supplies the browser window geometry at launch.
pub trait ViewportProvider: Send + Sync {
	fn window_size(&self) -> WindowSize;
}

/// Geometry fixed by configuration.
#[derive(Debug, Clone, Copy)]
pub struct FixedViewport(pub WindowSize);

impl ViewportProvider for FixedViewport {
	fn window_size(&self) -> WindowSize {
		self.0
	}
}
