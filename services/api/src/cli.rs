use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use drawback_claims::error::AppError;

/// Duty drawback claim service.
///
/// Without a subcommand the HTTP service starts with its configured defaults.
#[derive(Parser, Debug)]
#[command(name = "drawback-claims", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the claim API with health, readiness and metrics endpoints
    Serve(ServeArgs),
    /// Run one claim end to end against the offline backend and print every step
    Demo(DemoArgs),
}

impl Default for Command {
    fn default() -> Self {
        Command::Serve(ServeArgs::default())
    }
}

/// Flags that take precedence over `APP_*` configuration.
#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Bind address (overrides APP_HOST)
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Listen port (overrides APP_PORT)
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Remote drawback backend (overrides APP_BACKEND_URL); unset means offline
    #[arg(long, value_name = "URL")]
    pub(crate) backend_url: Option<String>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    match Cli::parse().command.unwrap_or_default() {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}
