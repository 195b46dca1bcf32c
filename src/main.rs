//! Waypoint CLI - closed-loop mission orchestration.

use clap::Parser;
use std::process;
use std::time::Instant;
use waypoint::action_log::{self, ActionLog};
use waypoint::cli::{Cli, Commands, ConfigCommands};
use waypoint::commands::{self, Output};
use waypoint::config::{ConfigOverrides, ResolvedConfig, resolve_config};
use waypoint::logging;

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    let overrides = ConfigOverrides {
        data_dir: cli.data_dir.clone(),
        backend: cli.backend,
    };
    let config = match resolve_config(&overrides) {
        Ok(config) => config,
        Err(e) => exit_with_error(&e, human),
    };
    logging::init(&config.log_level.value, config.log_format.value);

    let (cmd_name, args_json) = serialize_command(&cli.command);
    let start = Instant::now();

    let result = run_command(cli.command, &config, human);

    let duration = start.elapsed().as_millis() as u64;
    if config.action_log.value {
        let error = result.as_ref().err().map(|e| e.to_string());
        let entry = ActionLog::new(&cmd_name, args_json, result.is_ok(), error, duration);
        action_log::log_action(config.data_dir(), &entry);
    }

    if let Err(e) = result {
        exit_with_error(&e, human);
    }
}

fn exit_with_error(e: &waypoint::Error, human: bool) -> ! {
    if human {
        eprintln!("Error: {}", e);
    } else {
        eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
    }
    process::exit(1);
}

fn run_command(command: Commands, config: &ResolvedConfig, human: bool) -> waypoint::Result<()> {
    match command {
        Commands::Upsert { case, force } => {
            let mut graph = open_interruptible(config)?;
            output(&commands::upsert(&mut graph, &case, force)?, human)
        }
        Commands::Run { case } => {
            let mut graph = open_interruptible(config)?;
            output(&commands::run(&mut graph, &case)?, human)
        }
        Commands::Pause => output(
            &commands::set_paused(&mut commands::open_graph(config)?, true)?,
            human,
        ),
        Commands::Resume => output(
            &commands::set_paused(&mut commands::open_graph(config)?, false)?,
            human,
        ),
        Commands::Approve => output(
            &commands::approve(&mut commands::open_graph(config)?)?,
            human,
        ),
        Commands::Show => output(&commands::show(&commands::open_graph(config)?)?, human),
        Commands::Decisions { task } => output(
            &commands::decisions(&commands::open_graph(config)?, task.as_deref())?,
            human,
        ),
        Commands::Clear => output(&commands::clear(&mut commands::open_graph(config)?)?, human),
        Commands::Config { command } => match command {
            ConfigCommands::Show => output(&commands::config_show(config), human),
            ConfigCommands::Init { force } => output(&commands::config_init(config, force)?, human),
        },
    }

    Ok(())
}

/// Open the mission graph with Ctrl-C wired to its cancel token.
///
/// Cancelling stops the execution batch after the task in progress; the
/// partial results are still persisted.
fn open_interruptible(config: &ResolvedConfig) -> waypoint::Result<waypoint::autonomy::MissionGraph> {
    let graph = commands::open_graph(config)?;
    let cancel = graph.cancel_token();
    if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
        tracing::warn!(error = %e, "could not install Ctrl-C handler");
    }
    Ok(graph)
}

/// Print output in JSON or human-readable format.
fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}

/// Command name and arguments for the action log.
fn serialize_command(command: &Commands) -> (String, serde_json::Value) {
    match command {
        Commands::Upsert { case, force } => (
            "upsert".to_string(),
            serde_json::json!({ "case": case, "force": force }),
        ),
        Commands::Run { case } => ("run".to_string(), serde_json::json!({ "case": case })),
        Commands::Pause => ("pause".to_string(), serde_json::json!({})),
        Commands::Resume => ("resume".to_string(), serde_json::json!({})),
        Commands::Approve => ("approve".to_string(), serde_json::json!({})),
        Commands::Show => ("show".to_string(), serde_json::json!({})),
        Commands::Decisions { task } => (
            "decisions".to_string(),
            serde_json::json!({ "task": task }),
        ),
        Commands::Clear => ("clear".to_string(), serde_json::json!({})),
        Commands::Config { command } => match command {
            ConfigCommands::Show => ("config show".to_string(), serde_json::json!({})),
            ConfigCommands::Init { force } => (
                "config init".to_string(),
                serde_json::json!({ "force": force }),
            ),
        },
    }
}
