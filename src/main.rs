use std::time::Duration;

use anyhow::Result;
use colored::Colorize;

use commit_gen::cli::{self, Command};
use commit_gen::config::{self, TomlConfigStore};
use commit_gen::generate::Generator;
use commit_gen::git::GitCli;
use commit_gen::guard::CancelToken;
use commit_gen::logging;
use commit_gen::prompt;
use commit_gen::provider::HttpClientFactory;
use commit_gen::ui::{ConsoleNotifier, InquirePrompter};

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = cli::parse();
    logging::init_logger(cli.verbose);

    match cli.command {
        Some(Command::Config { ref action }) => {
            cli::run_config(action)?;
            return Ok(0);
        }
        Some(Command::Prompt) => {
            println!("{}", prompt::COMMIT_MESSAGE_TEMPLATE);
            return Ok(0);
        }
        None => {}
    }

    let mut store = TomlConfigStore::load()?;
    let timeout = Duration::from_secs(config::request_timeout_secs(&store));

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        log::warn!("Could not install Ctrl-C handler: {e}");
    }

    let source = GitCli::new(cli.repos);
    let sink = cli.output.into_sink(cli.extra_args);
    let clients = HttpClientFactory::new(timeout);

    let report = Generator::new(
        &source,
        sink.as_ref(),
        &mut store,
        &InquirePrompter,
        &clients,
        &ConsoleNotifier,
    )
    .with_backend(cli.backend)
    .with_cancel(cancel)
    .run();

    Ok(if report.is_success() {
        0
    } else if report.was_cancelled() {
        130
    } else {
        1
    })
}
