use anyhow::Result;
use ghcontrib::cli::Cli;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
    ghcontrib::config::load_dotenv();

    let cli = Cli::parse();
    cli.execute()
}
