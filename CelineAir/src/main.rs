mod logging;

use anyhow::{Context, Result, anyhow, bail};
use celineapi::{IrcelineClient, brussels_day};
use celineconfig::Config;
use celinesensor::{
    ConfigEntry, EntryInstance, FlowResult, Integration, IrcelineConfigExt, SensorDescription,
    Snapshot, UserInput, describe_sensors, project,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// CelineAir - Belgian air quality sensors from IRCEL - CELINE
#[derive(Parser, Debug)]
#[command(name = "CelineAir")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration directory (defaults to $CELINE_CONFIG, ./.celine or ~/.celine)
    #[arg(long, value_name = "DIR")]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the configured zones
    Zones,
    /// List the config entries
    Entries,
    /// Validate a zone and create a config entry for it
    Setup {
        /// Zone id, e.g. zone.home
        zone: String,
    },
    /// Change the zone of a config entry
    Options { entry_id: String, zone: String },
    /// Delete a config entry
    Remove { entry_id: String },
    /// Refresh one entry and print its sensors
    Refresh { entry_id: String },
    /// Poll every entry until Ctrl-C
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Arc::new(
        Config::load_config(cli.config_dir.as_deref().unwrap_or(""))
            .context("Cannot load configuration")?,
    );
    logging::init_logging(&config);

    match cli.command {
        Command::Zones => list_zones(&config),
        Command::Entries => list_entries(&config),
        Command::Setup { zone } => setup(&config, zone).await,
        Command::Options { entry_id, zone } => options(&config, &entry_id, &zone).await,
        Command::Remove { entry_id } => remove(&config, &entry_id),
        Command::Refresh { entry_id } => refresh(&config, &entry_id).await,
        Command::Run => run(&config).await,
    }
}

async fn build_integration(config: &Arc<Config>) -> Result<Integration> {
    let mut builder = IrcelineClient::builder()
        .base_url(config.get_api_base_url()?)
        .timeout(Duration::from_secs(config.get_api_timeout_secs()?));
    if let Some(user_agent) = config.get_api_user_agent()? {
        builder = builder.user_agent(user_agent);
    }
    let client = builder.build().await?;

    let integration = Integration::new(Arc::new(client), config.clone())?
        .with_update_interval(Duration::from_secs(config.get_update_interval_secs()?));
    Ok(integration)
}

fn find_entry(config: &Config, entry_id: &str) -> Result<ConfigEntry> {
    config
        .get_entry(entry_id)?
        .ok_or_else(|| anyhow!("Config entry not found: {}", entry_id))
}

fn list_zones(config: &Config) -> Result<()> {
    for zone in config.get_zones()? {
        println!(
            "{:<20} {:<20} ({}, {})",
            zone.id, zone.name, zone.latitude, zone.longitude
        );
    }
    Ok(())
}

fn list_entries(config: &Config) -> Result<()> {
    for entry in config.get_entries()? {
        println!("{}  {:<20} {}", entry.entry_id, entry.title, entry.zone());
    }
    Ok(())
}

async fn setup(config: &Arc<Config>, zone: String) -> Result<()> {
    let integration = build_integration(config).await?;

    match integration
        .config_flow()
        .step_user(Some(UserInput { zone }))
        .await
    {
        FlowResult::CreateEntry { title, data } => {
            let entry = ConfigEntry::new(title, data);
            config.save_entry(&entry)?;
            info!(entry_id = %entry.entry_id, title = %entry.title, "Config entry created");
            println!("{}", entry.entry_id);
            Ok(())
        }
        FlowResult::Form { errors, .. } => {
            let mut errors: Vec<_> = errors.into_iter().collect();
            errors.sort();
            let errors: Vec<String> = errors
                .into_iter()
                .map(|(field, key)| format!("{field}={key}"))
                .collect();
            bail!("Setup rejected: {}", errors.join(", "))
        }
    }
}

async fn options(config: &Arc<Config>, entry_id: &str, zone: &str) -> Result<()> {
    let entry = find_entry(config, entry_id)?;
    let integration = build_integration(config).await?;

    let updated = integration
        .options_flow(entry)
        .step_init(zone)
        .map_err(|err| anyhow!("Options rejected: {} ({})", err, err.form_error().1))?;
    config.save_entry(&updated)?;
    info!(entry_id = %entry_id, zone = %zone, "Options updated");
    Ok(())
}

fn remove(config: &Config, entry_id: &str) -> Result<()> {
    if !config.remove_entry(entry_id)? {
        bail!("Config entry not found: {}", entry_id);
    }
    info!(entry_id = %entry_id, "Config entry removed");
    Ok(())
}

async fn refresh(config: &Arc<Config>, entry_id: &str) -> Result<()> {
    let entry = find_entry(config, entry_id)?;
    let integration = build_integration(config).await?;
    let instance = integration.setup_entry(entry).await?;

    print_sensors(&instance);
    Ok(())
}

fn print_sensors(instance: &EntryInstance) {
    for sensor in &instance.sensors {
        let state = sensor.state();
        let value = state
            .value
            .map(|v| format!("{v}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<50} {:>8} {:<6} {}",
            sensor.entity_id(),
            value,
            sensor.native_unit_of_measurement().unwrap_or(""),
            sensor.extra_state_attributes()
        );
    }
}

fn log_snapshot(title: &str, descriptions: &[SensorDescription], snapshot: &Snapshot) {
    let today = brussels_day(Utc::now());
    for description in descriptions {
        let state = project(Some(snapshot), description.feature, description.horizon, today);
        info!(
            entry = %title,
            sensor = %description.key(),
            value = ?state.value,
            timestamp = ?state.timestamp,
            "Sensor state"
        );
    }
}

async fn run(config: &Arc<Config>) -> Result<()> {
    let integration = build_integration(config).await?;
    let descriptions = Arc::new(describe_sensors(integration.registry()));

    let entries = config.get_entries()?;
    if entries.is_empty() {
        warn!("No config entry, use the `setup` command first");
        return Ok(());
    }

    let mut handles = Vec::new();
    for entry in entries {
        let title = entry.title.clone();
        match integration.setup_entry(entry).await {
            Ok(instance) => {
                let listener_descriptions = descriptions.clone();
                instance
                    .coordinator
                    .subscribe(Arc::new(move |snapshot: &Arc<Snapshot>| {
                        log_snapshot(&title, &listener_descriptions, snapshot)
                    }));
                if let Some(snapshot) = instance.coordinator.data() {
                    log_snapshot(&instance.entry.title, &descriptions, &snapshot);
                }
                handles.push(instance.spawn_polling());
            }
            Err(err) => warn!(title = %title, "Entry not loaded: {}", err),
        }
    }

    info!("✅ CelineAir is ready, {} entry(ies) polling", handles.len());
    info!("Press Ctrl+C to stop...");
    tokio::signal::ctrl_c().await?;

    info!("Stopping...");
    integration.shutdown();
    for handle in handles {
        if let Err(err) = handle.await {
            warn!("Polling task failed: {}", err);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_options_command() {
        let cli = Cli::try_parse_from([
            "CelineAir",
            "--config-dir",
            "/tmp/celine",
            "options",
            "0b6c",
            "zone.office",
        ])
        .unwrap();

        assert_eq!(cli.config_dir.as_deref(), Some("/tmp/celine"));
        match cli.command {
            Command::Options { entry_id, zone } => {
                assert_eq!(entry_id, "0b6c");
                assert_eq!(zone, "zone.office");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_run_takes_no_argument() {
        assert!(matches!(
            Cli::try_parse_from(["CelineAir", "run"]).unwrap().command,
            Command::Run
        ));
        assert!(Cli::try_parse_from(["CelineAir", "run", "extra"]).is_err());
    }
}
