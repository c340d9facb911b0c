use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChatError>;

/// Whether a failure is worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	/// The page may still converge (slow render, detached node, overlay in the way).
	Retryable,
	/// Repeating the action cannot change the outcome.
	Fatal,
}

#[derive(Debug, Error)]
pub enum ChatError {
	#[error("timeout after {ms}ms waiting for: {target}")]
	Timeout { ms: u64, target: String },

	#[error("{action} failed on {selector}: {message}")]
	Interaction {
		action: &'static str,
		selector: String,
		message: String,
	},

	#[error("navigation to {url} failed: {message}")]
	Navigation { url: String, message: String },

	/// The document a script ran in went away mid-call, as during a page transition.
	#[error("page context lost: {0}")]
	ContextLost(String),

	#[error("authentication failed during {stage}")]
	Authentication {
		stage: &'static str,
		#[source]
		source: Box<ChatError>,
	},

	#[error("no credentials configured for login")]
	MissingCredentials,

	#[error("no reply blocks matched {selector}")]
	NoResponse { selector: String },

	#[error("browser session failed: {0}")]
	Session(String),

	#[error("automation driver error: {0}")]
	Driver(String),

	#[error("invalid configuration: {0}")]
	Config(String),
}

impl ChatError {
	pub fn timeout(target: impl Into<String>, timeout: std::time::Duration) -> Self {
		ChatError::Timeout {
			ms: timeout.as_millis() as u64,
			target: target.into(),
		}
	}

	pub fn interaction(action: &'static str, selector: impl ToString, message: impl ToString) -> Self {
		ChatError::Interaction {
			action,
			selector: selector.to_string(),
			message: message.to_string(),
		}
	}

	/// Wraps `source` as an authentication failure at `stage`.
	///
	/// Already-wrapped errors are passed through so the innermost stage wins.
	pub fn authentication(stage: &'static str, source: ChatError) -> Self {
		match source {
			err @ ChatError::Authentication { .. } => err,
			other => ChatError::Authentication {
				stage,
				source: Box::new(other),
			},
		}
	}

	/// Classifies the error for [`crate::retry`].
	pub fn kind(&self) -> ErrorKind {
		match self {
			ChatError::Timeout { .. }
			| ChatError::Interaction { .. }
			| ChatError::Navigation { .. }
			| ChatError::ContextLost(_) => ErrorKind::Retryable,
			ChatError::Authentication { .. }
			| ChatError::MissingCredentials
			| ChatError::NoResponse { .. }
			| ChatError::Session(_)
			| ChatError::Driver(_)
			| ChatError::Config(_) => ErrorKind::Fatal,
		}
	}

	pub fn is_retryable(&self) -> bool {
		self.kind() == ErrorKind::Retryable
	}
}
