use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "lending_analytics=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // stdout carries JSON payloads only.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> std::process::ExitCode {
    // Load .env early; ignore if missing.
    dotenvy::dotenv().ok();

    let cli = lending_analytics::Cli::parse();
    init_tracing(cli.verbose);

    match lending_analytics::run(cli) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            let payload = serde_json::json!({
                "error": {
                    "message": format!("{err:#}"),
                }
            });
            eprintln!("{payload}");
            std::process::ExitCode::FAILURE
        }
    }
}
