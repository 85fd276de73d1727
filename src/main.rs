use std::path::Path;
use std::process;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use snaplink::cli::{Cli, Commands, ConfigCommands};
use snaplink::codec;
use snaplink::config::{StaticConfig, get_config, init_config};
use snaplink::runtime::modes;
use snaplink::system::init_logging;

const DEFAULT_SAMPLE_PATH: &str = "config.example.toml";

#[actix_web::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "[ERROR]".red().bold(), e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Encode { id }) => {
            println!("{}", codec::encode(id));
            Ok(())
        }
        Some(Commands::Decode { code }) => {
            let id = codec::decode(&code).map_err(|e| anyhow::anyhow!(e.format_simple()))?;
            println!("{}", id);
            Ok(())
        }
        Some(Commands::Config {
            action: ConfigCommands::Generate { output_path, force },
        }) => generate_config(output_path.as_deref(), force),
        Some(Commands::Worker) => {
            init_config(cli.config.as_deref());
            let _guard = init_logging(&get_config().logging)?;
            modes::run_worker().await
        }
        Some(Commands::Serve { with_worker }) => {
            init_config(cli.config.as_deref());
            let _guard = init_logging(&get_config().logging)?;
            modes::run_server(with_worker).await
        }
        None => {
            init_config(cli.config.as_deref());
            let _guard = init_logging(&get_config().logging)?;
            modes::run_server(false).await
        }
    }
}

fn generate_config(output_path: Option<&str>, force: bool) -> Result<()> {
    let path = output_path.unwrap_or(DEFAULT_SAMPLE_PATH);
    if Path::new(path).exists() && !force {
        anyhow::bail!("{} already exists, use --force to overwrite", path);
    }
    StaticConfig::default()
        .save_to_file(path)
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", path, e))?;
    println!("{} Sample configuration written to {}", "✓".green(), path);
    Ok(())
}
