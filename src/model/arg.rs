use clap::Parser;

/// OAuth authorization-code relay for headless CLIs
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// OAuth client credentials file (provider download format)
    #[arg(long)]
    pub credentials: Option<String>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long)]
    pub port: Option<u16>,
}
