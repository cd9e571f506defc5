use clap::Parser;
use std::path::PathBuf;

use preseed::{load_settings, PreseedError, PreseedResult, TerminalPrompter};
use preseed_core::abstractions::{RemoteConnector, SystemHost};
use preseed_core::address::canonical_address;
use preseed_core::transport::{HttpsRemoteConnector, UnixSocketInventory};
use preseed_core::trust::certificate_fingerprint;
use preseed_core::{ConfigAssembler, PlannerContext};

#[derive(Parser)]
#[command(name = "preseed")]
#[command(about = "Interactive initialization wizard for container-management nodes", long_about = None)]
struct Cli {
    /// Planner configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run the wizard and produce a preseed
    Init {
        /// Daemon data directory
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Unix socket of the local daemon
        #[arg(long)]
        socket: Option<PathBuf>,

        /// Write the preseed YAML to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the effective planner configuration
    ShowDefaults,
    /// Print the certificate fingerprint of a cluster member
    Fingerprint {
        /// Address of the cluster member (default port appended when missing)
        address: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> PreseedResult<()> {
    // Logs go to stderr so prompts on stdout stay readable
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(
        "preseed=info"
            .parse()
            .map_err(|e| PreseedError::InvalidConfiguration {
                message: format!("Invalid log directive: {}", e),
            })?,
    );

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            data_dir,
            socket,
            output,
        } => {
            let settings = load_settings(cli.config.as_deref(), data_dir, socket)?;

            let host = SystemHost::new();
            let inventory = UnixSocketInventory::new(settings.socket_path());
            let connector = HttpsRemoteConnector::new();
            let ctx = PlannerContext {
                host: &host,
                inventory: &inventory,
                connector: &connector,
                settings: &settings,
            };

            let mut prompter = TerminalPrompter::new();
            let config = match ConfigAssembler::new(ctx).run(&mut prompter).await {
                Ok(config) => config,
                Err(e) if e.is_operator_abort() => {
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
                Err(e) => return Err(e),
            };

            if let Some(path) = output {
                tokio::fs::write(&path, config.to_yaml()?).await?;
                println!("Preseed written to {}", path.display());
            }
        }
        Commands::ShowDefaults => {
            let settings = load_settings(cli.config.as_deref(), None, None)?;
            print!("{}", settings.to_toml()?);
        }
        Commands::Fingerprint { address } => {
            let settings = load_settings(cli.config.as_deref(), None, None)?;
            let address = canonical_address(&address, settings.default_port);

            let der = HttpsRemoteConnector::new()
                .fetch_certificate(&address)
                .await?;
            println!("{}", certificate_fingerprint(&der));
        }
    }

    Ok(())
}
