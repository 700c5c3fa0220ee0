use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use superbox::{
    config::RegistryConfig,
    models::{CreateServerRequest, UpdateServerRequest},
    services::RegistryService,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "superbox-cli")]
#[command(about = "CLI tool for managing the Superbox server registry", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Server registry commands
    Server {
        #[command(subcommand)]
        command: ServerCommands,
    },
}

#[derive(Subcommand)]
enum ServerCommands {
    /// List registered servers
    List {
        /// Only show servers by this author
        #[arg(short, long)]
        author: Option<String>,
    },

    /// Show a server as JSON
    Get {
        /// Server name
        name: String,
    },

    /// Scan and register a server described by a JSON file
    Create {
        /// Path to the server JSON
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Merge the fields of a JSON file into an existing server
    Update {
        /// Current server name
        name: String,

        /// Path to the partial server JSON
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Delete a server
    Delete {
        /// Server name
        name: String,
    },
}

fn read_json<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<T, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing on stderr so command output stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "superbox=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    let config = RegistryConfig::from_env()?;

    // Only create talks to the scan gateway
    let registry_service = match &cli.command {
        Commands::Server {
            command: ServerCommands::Create { .. },
        } => config.build_registry_service().await?,
        Commands::Server { .. } => {
            RegistryService::without_scanner(config.build_repository().await?)
        }
    };

    match cli.command {
        Commands::Server { command } => match command {
            ServerCommands::List { author } => {
                match registry_service.list_servers(author.as_deref()).await {
                    Ok(list) => {
                        if list.servers.is_empty() {
                            println!("No servers found.");
                        } else {
                            println!("{:<30} {:<10} {:<20} {:<10}", "Name", "Version", "Author", "Lang");
                            println!("{}", "-".repeat(73));
                            for server in &list.servers {
                                println!(
                                    "{:<30} {:<10} {:<20} {:<10}",
                                    server.name, server.version, server.author, server.lang
                                );
                            }
                            println!("\nTotal: {} server(s)", list.total);
                        }
                    }
                    Err(err) => {
                        eprintln!("❌ Failed to list servers: {}", err);
                        std::process::exit(1);
                    }
                }
            }
            ServerCommands::Get { name } => match registry_service.get_server(&name).await {
                Ok(server) => {
                    println!("{}", serde_json::to_string_pretty(&server)?);
                }
                Err(err) => {
                    eprintln!("❌ {}", err);
                    std::process::exit(1);
                }
            },
            ServerCommands::Create { file } => {
                let request: CreateServerRequest = match read_json(&file) {
                    Ok(request) => request,
                    Err(err) => {
                        eprintln!("❌ Could not read {}: {}", file.display(), err);
                        std::process::exit(1);
                    }
                };

                println!("Scanning {} ...", request.repository.url);
                match registry_service.create_server(request).await {
                    Ok(server) => {
                        println!("✅ Server '{}' created successfully!", server.name);
                        if let Some(created_at) = &server.meta.created_at {
                            println!("  Created: {}", created_at);
                        }
                    }
                    Err(err) => {
                        eprintln!("❌ Failed to create server: {}", err);
                        std::process::exit(1);
                    }
                }
            }
            ServerCommands::Update { name, file } => {
                let overlay: UpdateServerRequest = match read_json(&file) {
                    Ok(overlay) => overlay,
                    Err(err) => {
                        eprintln!("❌ Could not read {}: {}", file.display(), err);
                        std::process::exit(1);
                    }
                };

                match registry_service.update_server(&name, overlay).await {
                    Ok(server) => {
                        if server.name != name {
                            println!("✅ Server '{}' renamed to '{}'", name, server.name);
                        } else {
                            println!("✅ Server '{}' updated successfully!", name);
                        }
                    }
                    Err(err) => {
                        eprintln!("❌ Failed to update server: {}", err);
                        std::process::exit(1);
                    }
                }
            }
            ServerCommands::Delete { name } => match registry_service.delete_server(&name).await {
                Ok(()) => {
                    println!("✅ Server '{}' deleted successfully!", name);
                }
                Err(err) => {
                    eprintln!("❌ {}", err);
                    std::process::exit(1);
                }
            },
        },
    }

    Ok(())
}
