mod cli;
mod config;
mod logging;
mod model;
mod providers;
mod store;
mod sync;

use std::sync::Arc;

use anyhow::Result;

use cli::{Command, IntegrationCmd, TaskCmd};
use model::integration::Integration;
use model::task::Task;
use store::json::{JsonIntegrationStore, JsonTaskStore};
use store::{IntegrationStore, TaskStore};
use sync::orchestrator::SyncOrchestrator;
use sync::{MultiProviderSyncResult, SyncResult};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match cli::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}\n");
            cli::print_help();
            std::process::exit(2);
        }
    };

    let config = config::load_config()?;
    let data = config::data_dir();
    let tasks: Arc<dyn TaskStore> = Arc::new(JsonTaskStore::open(data.join("tasks.json"))?);
    let integrations: Arc<dyn IntegrationStore> =
        Arc::new(JsonIntegrationStore::open(data.join("integrations.json"))?);
    let services = sync::default_services(Arc::clone(&tasks));
    let orchestrator = SyncOrchestrator::new(Arc::clone(&integrations), services.clone());

    match command {
        Command::Help => cli::print_help(),
        Command::Sync(sync_args) => {
            let options = cli::sync_options(&sync_args, &config);
            let result = if sync_args.emergency {
                orchestrator.run_emergency_sync().await
            } else if !sync_args.ids.is_empty() {
                orchestrator
                    .sync_specific_integrations(&sync_args.ids, &options)
                    .await
            } else if let Some(provider) = &sync_args.provider {
                orchestrator.sync_provider(provider, &options).await
            } else {
                orchestrator.run_smart_sync(&options).await
            };
            print_multi_result(&result);
            if !result.success {
                std::process::exit(1);
            }
        }
        Command::Update { provider } => {
            let mut all_ok = true;
            let targets = match &provider {
                Some(provider) => integrations.get_active_by_provider(provider).await?,
                None => integrations.get_all_active().await?,
            };
            if targets.is_empty() {
                println!("No active integrations to update.");
            }
            for integration in targets {
                let Some(service) = services.get(&integration.provider) else {
                    eprintln!(
                        "{}: no sync service for provider '{}'",
                        integration.id, integration.provider
                    );
                    all_ok = false;
                    continue;
                };
                let result = service.update_existing_from_remote(&integration).await;
                print_sync_result(&integration, &result);
                all_ok &= result.success;
            }
            if !all_ok {
                std::process::exit(1);
            }
        }
        Command::Integration(cmd) => run_integration_cmd(cmd, integrations.as_ref()).await?,
        Command::Task(cmd) => run_task_cmd(cmd, tasks.as_ref()).await?,
    }

    Ok(())
}

async fn run_integration_cmd(cmd: IntegrationCmd, store: &dyn IntegrationStore) -> Result<()> {
    match cmd {
        IntegrationCmd::List => {
            let all = store.get_all().await?;
            if all.is_empty() {
                println!("No integrations configured. Add one with 'tasksmith integration add'.");
                return Ok(());
            }
            for integration in all {
                let state = if integration.active { "active" } else { "inactive" };
                let last = integration
                    .last_sync_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{}  {}  {}  [{}]  last sync: {}",
                    integration.id, integration.provider, integration.organization, state, last
                );
            }
        }
        IntegrationCmd::Add {
            provider,
            organization,
            credential,
            project,
        } => {
            let added = store
                .add(Integration::new(provider, organization, credential, project))
                .await?;
            println!("Added integration {} ({})", added.id, added.provider);
        }
        IntegrationCmd::Enable { id } => {
            store.set_active(&id, true).await?;
            println!("Enabled {id}");
        }
        IntegrationCmd::Disable { id } => {
            store.set_active(&id, false).await?;
            println!("Disabled {id}");
        }
        IntegrationCmd::Remove { id } => {
            store.set_active(&id, false).await?;
            store.delete(&id).await?;
            println!("Removed {id}");
        }
    }
    Ok(())
}

async fn run_task_cmd(cmd: TaskCmd, store: &dyn TaskStore) -> Result<()> {
    match cmd {
        TaskCmd::List => {
            let all = store.get_all().await?;
            if all.is_empty() {
                println!("No tasks yet.");
                return Ok(());
            }
            for task in all {
                print_task_line(&task);
            }
        }
        TaskCmd::Find { needle } => {
            let hits = store.find_by_title(&needle).await?;
            if hits.is_empty() {
                println!("No tasks matching '{needle}'.");
                return Ok(());
            }
            for task in hits {
                print_task_line(&task);
            }
        }
        TaskCmd::Add { title, description } => {
            let mut task = Task::new(title);
            task.description = description;
            let added = store.add(task).await?;
            println!("Created {}: {}", added.id, added.title);
        }
    }
    Ok(())
}

fn print_task_line(task: &Task) {
    let link = match (&task.external_provider, &task.external_id) {
        (Some(provider), Some(id)) => format!("  ({provider}:{id})"),
        _ => String::new(),
    };
    println!(
        "{}  [{}] [{}]  {}{link}",
        task.id, task.status, task.priority, task.title
    );
}

fn print_multi_result(result: &MultiProviderSyncResult) {
    let elapsed = result.finished_at - result.started_at;
    println!(
        "Sync {}: {} succeeded, {} failed ({}ms)",
        if result.success { "finished" } else { "FAILED" },
        result.synced.len(),
        result.failed.len(),
        elapsed.num_milliseconds()
    );
    for integration in &result.synced {
        println!("  ok    {} {} {}", integration.id, integration.provider, integration.organization);
    }
    for failure in &result.failed {
        println!(
            "  fail  {} {}: {}",
            failure.integration.id, failure.integration.provider, failure.error
        );
    }
    if let Some(global) = &result.global_error {
        println!("  error {global}");
    }
}

fn print_sync_result(integration: &Integration, result: &SyncResult) {
    println!(
        "{} ({}): {}",
        integration.id, integration.provider, result.message
    );
    for line in list_preview(&result.updated_items) {
        println!("  {line}");
    }
    for line in list_preview(&result.error_messages) {
        println!("  ! {line}");
    }
}

/// First few entries of a list, with a trailer when truncated.
fn list_preview(items: &[String]) -> Vec<String> {
    const LIMIT: usize = 10;
    let mut preview: Vec<String> = items.iter().take(LIMIT).cloned().collect();
    if items.len() > LIMIT {
        preview.push(format!("... and {} more", items.len() - LIMIT));
    }
    preview
}
