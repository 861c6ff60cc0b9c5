use clap::Parser;
use colored::Colorize;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use reqview_core::store::build_request;
use reqview_core::{Action, ActionName, CoreError, FileSidecar, Session, Store};

mod commands;
mod render;
mod reqwest_client;

use commands::Command;
use reqwest_client::ReqwestClient;

type CliSession = Session<ReqwestClient, FileSidecar>;

/// reqview — explore HTTP/JSON APIs from the terminal
#[derive(Parser, Debug)]
#[command(
    name = "reqview",
    version,
    about = "Send HTTP requests and reshape their JSON responses"
)]
struct Cli {
    /// File the last request and view settings are remembered in
    #[arg(long = "state-file")]
    state_file: Option<PathBuf>,

    /// Do not resend the remembered request at startup
    #[arg(long)]
    no_autosend: bool,

    /// Show verbose output (debug logs, headers, body details)
    #[arg(short, long)]
    verbose: bool,

    /// Request URL to start with
    #[arg(short = 'u', long)]
    url: Option<String>,

    /// HTTP method to start with (e.g., GET, POST)
    #[arg(short = 'm', long)]
    method: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let path = cli.state_file.clone().unwrap_or_else(default_state_file);
    let sidecar = match FileSidecar::open(&path) {
        Ok(s) => {
            tracing::debug!(path = %path.display(), "state file loaded");
            s
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "cannot read state file");
            render::error(&format!(
                "Error reading state file '{}': {}",
                path.display().to_string().bold(),
                e
            ));
            process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            render::error(&format!("Failed to start runtime: {}", e));
            process::exit(1);
        }
    };

    let client = ReqwestClient::new(Duration::from_secs(cli.timeout));
    let mut session = Session::new(Store::new(sidecar), client);
    subscribe(&mut session, cli.verbose);

    let result = runtime.block_on(run(&mut session, &cli));
    tracing::debug!(in_flight = session.in_flight(), "shutting down");
    // the blocking HTTP client must be released outside the runtime
    drop(session);
    runtime.shutdown_timeout(Duration::from_millis(500));

    if let Err(e) = result {
        render::error(&format!("Input error: {}", e));
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("REQVIEW_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn default_state_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("reqview")
        .join("state.json")
}

/// Wire the terminal panels to the store.
fn subscribe(session: &mut CliSession, verbose: bool) {
    let store = session.store_mut();
    store.register(ActionName::SendRequest, move |action, state| {
        let request = match action {
            Action::SendRequest(Some(explicit)) => Some(explicit.clone()),
            _ => build_request(state).ok(),
        };
        if let Some(request) = request {
            render::request(&request, verbose);
        }
    });
    store.register(ActionName::UpdateResponse, |_, state| render::view(state));
    store.register(ActionName::UpdateResponseError, |action, _| {
        if let Action::UpdateResponseError(message) = action {
            render::error(message);
        }
    });
    store.register(ActionName::UpdateResponseTransform, |_, state| {
        if state.response.is_some() {
            render::view(state);
        } else if let Some(err) = &state.response_transform_error {
            println!("  {} {}", "Transform error:".yellow(), err);
        }
    });
    store.register(ActionName::UpdateViewKey, |_, state| render::table(state));
}

fn report(result: Result<(), CoreError>) {
    if let Err(e) = result {
        render::error(&e.to_string());
    }
}

fn prompt() {
    print!("{} ", "reqview>".bold());
    let _ = std::io::stdout().flush();
}

async fn run(session: &mut CliSession, cli: &Cli) -> std::io::Result<()> {
    if let Some(url) = &cli.url {
        report(session.dispatch(Action::UpdateRequestUrl(url.clone())));
    }
    if let Some(method) = &cli.method {
        report(commands::execute(session, Command::Method(method.to_uppercase())));
    }
    if !cli.no_autosend && !session.state().request_url.is_empty() {
        report(session.dispatch(Action::SendRequest(None)));
    }

    println!("{}", "Type 'help' for commands.".dimmed());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match commands::parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => report(commands::execute(session, command)),
                    Err(message) => render::error(&message),
                }
            }
            Some(completion) = session.next_completion() => {
                println!();
                if let Ok(response) = &completion.result {
                    render::status(response, cli.verbose);
                }
                report(session.complete(completion));
            }
        }
    }
    Ok(())
}
