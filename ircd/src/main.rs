use std::{path::PathBuf, sync::Arc};

use structopt::StructOpt;

use ircd::{Server, ServerConfig};

#[derive(Debug, StructOpt)]
#[structopt(rename_all = "kebab")]
struct Opts {
    /// Server config file location; defaults apply when omitted
    #[structopt(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opts = Opts::from_args();

    let config = match &opts.config {
        Some(path) => ServerConfig::load_file(path)?,
        None => ServerConfig::default(),
    };

    tracing_subscriber::fmt::init();

    let server = Arc::new(Server::new(config)?);
    server.run().await?;
    Ok(())
}
