//! gce-bench CLI - provision Compute Engine instances and collect benchmarks.

use std::io::{self, IsTerminal};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use gce_bench::driver::{
    self, LinePrompter, Outcome, Prompter, TerminalPrompter, DEFAULT_MACHINE_TYPE,
};
use gce_bench::{ui, BenchRunner, Config, Gce, IapSsh};

/// gce-bench - Benchmark Compute Engine machine types.
#[derive(Parser)]
#[command(name = "gce-bench")]
#[command(about = "Create Compute Engine VMs that run sysbench, stress-ng and fio on boot")]
#[command(
    long_about = "Create Compute Engine VMs that run sysbench, stress-ng and fio on boot.\n\n\
                  Configuration is read from GCP_* environment variables and an optional\n\
                  .env file. Without a subcommand an interactive session is started."
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List instances, then create or delete one interactively (default).
    Interactive,

    /// List instances in the configured project and zone.
    List,

    /// Create an instance and collect its benchmark results.
    Create {
        /// Instance name.
        #[arg(long)]
        name: String,

        /// Machine type (e.g., e2-micro, n2-standard-4).
        #[arg(long, default_value = DEFAULT_MACHINE_TYPE)]
        machine_type: String,

        /// Skip waiting for and fetching benchmark results.
        #[arg(long, default_value = "false")]
        no_results: bool,
    },

    /// Delete an instance.
    Delete {
        /// Instance name.
        #[arg(long)]
        name: String,

        /// Skip confirmation prompt.
        #[arg(long, short = 'y', default_value = "false")]
        yes: bool,
    },

    /// Fetch the benchmark log from an existing instance.
    Results {
        /// Instance name.
        #[arg(long)]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let mut config = Config::load();
    // dialoguer needs a terminal; piped answers are read line by line.
    let on_terminal = io::stdin().is_terminal() && io::stderr().is_terminal();
    let mut prompter: Box<dyn Prompter> = if on_terminal {
        Box::new(TerminalPrompter::default())
    } else {
        Box::new(LinePrompter::new(io::stdin().lock(), io::stdout()))
    };
    let mut out = io::stdout();
    let command = cli.command.unwrap_or(Commands::Interactive);

    if matches!(command, Commands::Interactive) {
        driver::ensure_project_id(&mut config, prompter.as_mut(), &mut out)?;
    }

    info!(
        project = %config.project_id,
        zone = %config.zone,
        readiness = %config.readiness,
        "Configuration loaded"
    );

    let provider = Gce::from_config(&config)
        .await
        .context("Failed to create Compute Engine provider")?;
    let remote = IapSsh::new(&config);
    let runner = BenchRunner::new(config, provider, remote)?;

    match command {
        Commands::Interactive => {
            ui::print_section("Compute Engine benchmark");
            match driver::run(&runner, prompter.as_mut(), &mut out).await? {
                Outcome::Created {
                    name,
                    results: None,
                } => {
                    ui::print_warning(&format!(
                        "Instance '{name}' was kept. Retry with `gce-bench results --name {name}`"
                    ));
                }
                Outcome::Created { name, .. } => {
                    ui::print_info(&format!(
                        "Instance '{name}' is still running. Delete it with `gce-bench delete --name {name}`"
                    ));
                }
                Outcome::Listed
                | Outcome::Deleted(_)
                | Outcome::NothingToDelete
                | Outcome::InvalidAction(_) => {}
            }
        }

        Commands::List => {
            runner
                .list_instances(&mut out)
                .await
                .context("Error listing instances")?;
        }

        Commands::Create {
            name,
            machine_type,
            no_results,
        } => {
            let results =
                driver::create_and_collect(&runner, &mut out, &name, &machine_type, !no_results)
                    .await?;
            if !no_results && results.is_none() {
                ui::print_warning(&format!(
                    "Instance '{name}' was kept. Retry with `gce-bench results --name {name}`"
                ));
            }
        }

        Commands::Delete { name, yes } => {
            let prompt = format!("Delete instance '{name}'? This cannot be undone");
            if !yes && !prompter.confirm(&prompt)? {
                println!("Deletion cancelled.");
                return Ok(());
            }

            runner
                .delete_instance(&mut out, &name)
                .await
                .context("Error deleting instance")?;
        }

        Commands::Results { name } => {
            let results = runner
                .fetch_benchmark_results(&name)
                .await
                .context("Error retrieving benchmark results")?;
            println!("Benchmark Results:");
            println!("{results}");
        }
    }

    Ok(())
}
