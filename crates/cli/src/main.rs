use std::io::Read;

use clap::Parser;
use pw_chat::Orchestrator;
use pw_chat_cli::browser::{ChromeSessionFactory, FixedViewport};
use pw_chat_cli::cli::Cli;
use pw_chat_cli::error::{CliError, Result};
use pw_chat_cli::logging;
use pw_chat_cli::settings::{self, Settings};
use tracing::{debug, error};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	match dotenvy::dotenv() {
		Ok(path) => debug!(target = "pw-chat", path = %path.display(), "loaded .env"),
		Err(err) if err.not_found() => {}
		Err(err) => error!(target = "pw-chat", error = %err, "ignoring unreadable .env"),
	}

	match run(cli).await {
		Ok(reply) => println!("{reply}"),
		Err(err) => {
			error!(target = "pw-chat", "{}", err.report());
			std::process::exit(1);
		}
	}
}

async fn run(cli: Cli) -> Result<String> {
	let settings = Settings::load(&cli, settings::process_env)?;
	let prompt = read_prompt(&cli)?;

	let factory = ChromeSessionFactory::new(settings.launch.clone(), FixedViewport(settings.launch.window));
	let orchestrator = Orchestrator::new(settings.chat, factory);
	let reply = orchestrator.run(&prompt, cli.conversation.as_deref()).await?;
	Ok(reply.text)
}

fn read_prompt(cli: &Cli) -> Result<String> {
	let prompt = match cli.inline_prompt() {
		Some(prompt) => prompt.to_string(),
		None => {
			let mut buf = String::new();
			std::io::stdin().read_to_string(&mut buf).map_err(CliError::Stdin)?;
			let trimmed = buf.strip_suffix('\n').unwrap_or(&buf);
			trimmed.strip_suffix('\r').unwrap_or(trimmed).to_string()
		}
	};

	if prompt.trim().is_empty() {
		return Err(CliError::EmptyPrompt);
	}
	Ok(prompt)
}
