use drawback_claims_api::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("drawback claims error: {err}");
        std::process::exit(1);
    }
}
