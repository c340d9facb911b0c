use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "pw-chat")]
#[command(about = "Send a prompt to a browser-hosted chat and print the reply")]
#[command(version)]
pub struct Cli {
	/// Prompt text. Read from stdin when omitted or `-`
	pub prompt: Option<String>,

	/// Resume the conversation with this exact sidebar title
	#[arg(short, long, value_name = "TITLE")]
	pub conversation: Option<String>,

	/// TOML settings file (also read from PW_CHAT_CONFIG)
	#[arg(long, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Persistent browser profile directory
	#[arg(long, value_name = "DIR")]
	pub profile_dir: Option<PathBuf>,

	/// Run the browser without a visible window
	#[arg(long)]
	pub headless: bool,

	/// Browser window size, e.g. 1280x900
	#[arg(long, value_name = "WxH")]
	pub window_size: Option<WindowSize>,

	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,
}

impl Cli {
	/// Prompt given on the command line, `None` when it must come from stdin.
	pub fn inline_prompt(&self) -> Option<&str> {
		self.prompt.as_deref().filter(|p| *p != "-")
	}
}

/// Window dimensions in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
	pub width: u32,
	pub height: u32,
}

impl fmt::Display for WindowSize {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}x{}", self.width, self.height)
	}
}

impl FromStr for WindowSize {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (w, h) = s
			.split_once(['x', 'X'])
			.ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{s}`"))?;
		let parse = |v: &str| v.trim().parse::<u32>().ok().filter(|n| *n > 0);
		match (parse(w), parse(h)) {
			(Some(width), Some(height)) => Ok(Self { width, height }),
			_ => Err(format!("window size must be two positive integers, got `{s}`")),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_prompt_and_flags() {
		let cli = Cli::try_parse_from(["pw-chat", "-c", "Proposals", "--window-size", "1024x768", "-vv", "Hello"]).unwrap();
		assert_eq!(cli.inline_prompt(), Some("Hello"));
		assert_eq!(cli.conversation.as_deref(), Some("Proposals"));
		assert_eq!(
			cli.window_size,
			Some(WindowSize {
				width: 1024,
				height: 768
			})
		);
		assert_eq!(cli.verbose, 2);
		assert!(!cli.headless);
	}

	#[test]
	fn dash_means_stdin() {
		let cli = Cli::try_parse_from(["pw-chat", "-"]).unwrap();
		assert_eq!(cli.inline_prompt(), None);

		let cli = Cli::try_parse_from(["pw-chat"]).unwrap();
		assert_eq!(cli.inline_prompt(), None);
	}

	#[test]
	fn rejects_malformed_window_size() {
		assert!("1024".parse::<WindowSize>().is_err());
		assert!("0x768".parse::<WindowSize>().is_err());
		assert!("wide x tall".parse::<WindowSize>().is_err());
		assert!(Cli::try_parse_from(["pw-chat", "--window-size", "big", "Hi"]).is_err());
	}
}
