//! CLI for serverinfo: serve or print runtime telemetry of this process.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "serverinfo")]
#[command(about = "serverinfo - runtime telemetry aggregated into one JSON tree")]
#[command(version = serverinfo_core::VERSION)]
struct Cli {
    /// JSON settings document; its `serverInfo` object sets path, user and pass
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Nominal interval of the event-loop delay probe, in milliseconds
    #[arg(long, global = true, default_value = "10000")]
    loop_interval_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the metrics tree and its description over HTTP
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Require HTTP Basic auth (user/pass from settings) on the metrics route
        #[arg(long)]
        auth: bool,
    },

    /// Run one aggregation cycle and print the tree as JSON
    Snapshot {
        /// Time to let CPU rates (and the loop probe) accumulate before collecting
        #[arg(long, default_value = "250")]
        settle_ms: u64,
    },

    /// Print the description of every metric as JSON
    Describe,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let settings = commands::load_settings(cli.settings.as_deref());
    let loop_interval = commands::loop_interval(cli.loop_interval_ms);

    match cli.command {
        Commands::Serve { host, port, auth } => {
            commands::serve::run(&settings, &host, port, auth, loop_interval)
        }
        Commands::Snapshot { settle_ms } => commands::snapshot::run(settle_ms, loop_interval),
        Commands::Describe => commands::describe::run(loop_interval),
    }
}
