use anyhow::{bail, Result};
use chrono::Duration;

use crate::config::AppConfig;
use crate::sync::SyncOptions;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Sync(SyncArgs),
    Update { provider: Option<String> },
    Integration(IntegrationCmd),
    Task(TaskCmd),
    Help,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SyncArgs {
    pub force: bool,
    pub emergency: bool,
    pub provider: Option<String>,
    pub ids: Vec<String>,
    pub jobs: Option<usize>,
    pub max_age_minutes: Option<i64>,
    pub timeout_secs: Option<u64>,
    pub skip_test: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IntegrationCmd {
    List,
    Add {
        provider: String,
        organization: String,
        credential: String,
        project: Option<String>,
    },
    Enable { id: String },
    Disable { id: String },
    Remove { id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskCmd {
    List,
    Find { needle: String },
    Add { title: String, description: Option<String> },
}

pub fn parse(args: &[String]) -> Result<Command> {
    let Some(command) = args.first() else {
        return Ok(Command::Help);
    };
    match command.as_str() {
        "sync" => Ok(Command::Sync(parse_sync_args(&args[1..])?)),
        "update" => parse_update_args(&args[1..]),
        "integration" | "integrations" => parse_integration_args(&args[1..]),
        "task" | "tasks" => parse_task_args(&args[1..]),
        "help" | "--help" | "-h" => Ok(Command::Help),
        other => bail!("Unknown command '{other}'. Run 'tasksmith help' for usage."),
    }
}

fn parse_sync_args(args: &[String]) -> Result<SyncArgs> {
    let mut parsed = SyncArgs::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--force" | "-f" => parsed.force = true,
            "--emergency" => parsed.emergency = true,
            "--skip-test" => parsed.skip_test = true,
            "--provider" | "-p" => {
                parsed.provider = Some(flag_value(args, &mut i, "--provider")?);
            }
            "--ids" => {
                let value = flag_value(args, &mut i, "--ids")?;
                parsed.ids = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                if parsed.ids.is_empty() {
                    bail!("--ids needs at least one integration id");
                }
            }
            "--jobs" | "-j" => {
                let value = flag_value(args, &mut i, "--jobs")?;
                parsed.jobs = Some(parse_number(&value, "--jobs")?);
            }
            "--max-age" => {
                let value = flag_value(args, &mut i, "--max-age")?;
                parsed.max_age_minutes = Some(parse_number(&value, "--max-age")?);
            }
            "--timeout" => {
                let value = flag_value(args, &mut i, "--timeout")?;
                parsed.timeout_secs = Some(parse_number(&value, "--timeout")?);
            }
            other => bail!("Unknown sync flag '{other}'"),
        }
        i += 1;
    }
    if parsed.emergency && (parsed.force || !parsed.ids.is_empty() || parsed.provider.is_some()) {
        bail!("--emergency cannot be combined with --force, --ids or --provider");
    }
    Ok(parsed)
}

fn parse_update_args(args: &[String]) -> Result<Command> {
    let mut provider = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--provider" | "-p" => provider = Some(flag_value(args, &mut i, "--provider")?),
            other => bail!("Unknown update flag '{other}'"),
        }
        i += 1;
    }
    Ok(Command::Update { provider })
}

fn parse_integration_args(args: &[String]) -> Result<Command> {
    let Some(action) = args.first() else {
        return Ok(Command::Integration(IntegrationCmd::List));
    };
    let cmd = match action.as_str() {
        "list" => IntegrationCmd::List,
        "add" => {
            let rest = &args[1..];
            if rest.len() < 3 {
                bail!(
                    "Usage: tasksmith integration add <provider> <organization> <credential> [project]"
                );
            }
            IntegrationCmd::Add {
                provider: rest[0].clone(),
                organization: rest[1].clone(),
                credential: rest[2].clone(),
                project: rest.get(3).cloned(),
            }
        }
        "enable" => IntegrationCmd::Enable {
            id: required_id(args, "enable")?,
        },
        "disable" => IntegrationCmd::Disable {
            id: required_id(args, "disable")?,
        },
        "remove" => IntegrationCmd::Remove {
            id: required_id(args, "remove")?,
        },
        other => bail!("Unknown integration action '{other}'"),
    };
    Ok(Command::Integration(cmd))
}

fn parse_task_args(args: &[String]) -> Result<Command> {
    let Some(action) = args.first() else {
        return Ok(Command::Task(TaskCmd::List));
    };
    let cmd = match action.as_str() {
        "list" => TaskCmd::List,
        "find" => {
            let needle = args[1..].join(" ");
            if needle.is_empty() {
                bail!("Usage: tasksmith task find <text>");
            }
            TaskCmd::Find { needle }
        }
        "add" => {
            let (title, description) = parse_task_add(&args[1..])?;
            TaskCmd::Add { title, description }
        }
        other => bail!("Unknown task action '{other}'"),
    };
    Ok(Command::Task(cmd))
}

/// Parse `task add` arguments into (title, optional description).
///
/// Supported forms:
///   tasksmith task add "My task title"
///   tasksmith task add My task title
///   tasksmith task add "My task" -d "The description"
fn parse_task_add(args: &[String]) -> Result<(String, Option<String>)> {
    if args.is_empty() {
        bail!("Usage: tasksmith task add <title> [-d <description>]");
    }

    let mut title_parts: Vec<String> = Vec::new();
    let mut description: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-d" | "--desc" | "--description" => {
                i += 1;
                if i < args.len() {
                    description = Some(args[i].clone());
                } else {
                    bail!("Missing value for -d/--desc flag");
                }
            }
            _ => title_parts.push(args[i].clone()),
        }
        i += 1;
    }

    let title = title_parts.join(" ");
    if title.is_empty() {
        bail!("Task title cannot be empty");
    }
    Ok((title, description))
}

fn required_id(args: &[String], action: &str) -> Result<String> {
    match args.get(1) {
        Some(id) => Ok(id.clone()),
        None => bail!("Usage: tasksmith integration {action} <id>"),
    }
}

fn flag_value(args: &[String], i: &mut usize, flag: &str) -> Result<String> {
    *i += 1;
    match args.get(*i) {
        Some(value) => Ok(value.clone()),
        None => bail!("Missing value for {flag} flag"),
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, flag: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid number '{value}' for {flag}"))
}

/// Resolve the effective options for one run: config defaults, then flags.
/// `--ids` without `--jobs` drops to a gentler concurrency of 2.
pub fn sync_options(args: &SyncArgs, config: &AppConfig) -> SyncOptions {
    let mut options = if args.emergency {
        SyncOptions::emergency()
    } else {
        config.sync_options()
    };
    options.force_sync = args.force;
    if args.skip_test {
        options.skip_test_connection = true;
    }
    if let Some(minutes) = args.max_age_minutes {
        options.max_age = Duration::minutes(minutes);
    }
    if let Some(secs) = args.timeout_secs {
        options.sync_timeout = Some(std::time::Duration::from_secs(secs));
    }
    match args.jobs {
        Some(jobs) => options.concurrent_syncs = jobs,
        None if !args.ids.is_empty() => options.concurrent_syncs = 2,
        None => {}
    }
    options
}

pub fn print_help() {
    println!("tasksmith: personal task tracker with issue-tracker sync\n");
    println!("USAGE:");
    println!("  tasksmith sync                      Sync integrations that are due");
    println!("  tasksmith sync --force              Sync every active integration");
    println!("  tasksmith sync --emergency          Serial recovery sync (5 min staleness)");
    println!("  tasksmith sync --provider <tag>     Sync one provider (GitHub, AzureDevOps)");
    println!("  tasksmith sync --ids <a,b>          Sync specific integrations by id");
    println!("  tasksmith update [--provider <tag>] Refresh task status from remote state");
    println!("  tasksmith integration list|add|enable|disable|remove");
    println!("  tasksmith task list|find|add");
    println!();
    println!("SYNC FLAGS:");
    println!("  --jobs <n>       Concurrent syncs per provider group (default 3)");
    println!("  --max-age <min>  Staleness threshold in minutes (default 60)");
    println!("  --timeout <sec>  Per-integration sync timeout");
    println!("  --skip-test      Skip the connection pre-test");
}
