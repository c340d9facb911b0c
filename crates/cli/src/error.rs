use std::path::PathBuf;

use pw_chat::ChatError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error(transparent)]
	Chat(#[from] ChatError),

	#[error("invalid configuration: {0}")]
	Config(String),

	#[error("failed to read config file {path}")]
	ConfigRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse config file {path}")]
	ConfigParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("invalid {field} URL `{value}`")]
	InvalidUrl {
		field: &'static str,
		value: String,
		#[source]
		source: url::ParseError,
	},

	#[error("prompt is empty")]
	EmptyPrompt,

	#[error("failed to read prompt from stdin")]
	Stdin(#[source] std::io::Error),
}

impl CliError {
	/// Renders the error with its `source` chain, one cause per line.
	pub fn report(&self) -> String {
		let mut out = self.to_string();
		let mut source = std::error::Error::source(self);
		while let Some(cause) = source {
			out.push_str("\n  caused by: ");
			out.push_str(&cause.to_string());
			source = cause.source();
		}
		out
	}
}
