use std::io::Error;

#[tokio::main]
async fn main() -> Result<(), Error> {
    farmdesk_cli::run_cli().await
}
