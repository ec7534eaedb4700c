mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use drawback_claims::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
