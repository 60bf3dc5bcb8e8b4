/// Main entry point for the matching engine application
///
/// This serves as a thin wrapper that delegates to the interfaces layer.
/// The actual application logic is implemented in `interfaces::cli`.

use matching_sequencer::interfaces::cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run().await {
        eprintln!("撮合引擎退出: {}", e);
        std::process::exit(1);
    }
}
