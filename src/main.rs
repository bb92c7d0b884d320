use clap::{Parser, Subcommand, ValueEnum};
use empresa_alerts::models::{AlertType, CompanyType, HardwareRecord, Usuario};
use empresa_alerts::watcher::{ActiveAlertsSource, HardwareIncidentsSource};
use empresa_alerts::{
    logging, ApiClient, Channel, Config, FileStorage, LogSink, NotificationSink, PollReport,
    Poller, SeenSetNotifier, SlackSink, Storage, Watcher,
};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "empresa-alerts")]
#[command(about = "Notifies once per newly active company alert or hardware incident", long_about = None)]
struct Args {
    /// Verbose output (-v, -vv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll on the configured interval until Ctrl-C (default)
    Watch,
    /// Run a single poll cycle and exit
    PollOnce,
    /// Forget which items were already notified
    ClearHistory {
        #[arg(value_enum)]
        target: Option<HistoryTarget>,
    },
    /// Print mapped records of a resource as JSON lines
    List {
        #[arg(value_enum)]
        resource: Resource,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum HistoryTarget {
    Alerts,
    Hardware,
    All,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Resource {
    AlertTypes,
    CompanyTypes,
    Users,
    Hardware,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    logging::init_tracing(args.verbose);

    let config_path = std::env::var("CONFIG").unwrap_or_else(|_| "config.json".to_string());
    let config = Config::load(Path::new(&config_path))?;
    let client = ApiClient::new(&config.api)?;
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(&config.state_file));

    match args.command.unwrap_or(Command::Watch) {
        Command::Watch => watch(&config, &client, storage).await?,
        Command::PollOnce => {
            let watcher = build_watcher(&config, &client, storage);
            log_report(&watcher.poll_once().await);
        }
        Command::ClearHistory { target } => {
            let watcher = build_watcher(&config, &client, storage);
            let channel = match target.unwrap_or(HistoryTarget::All) {
                HistoryTarget::Alerts => Some(Channel::Alerts),
                HistoryTarget::Hardware => Some(Channel::Hardware),
                HistoryTarget::All => None,
            };
            watcher.clear_history(channel).await;
        }
        Command::List { resource } => list(&config, &client, resource).await?,
    }
    Ok(())
}

fn build_watcher(config: &Config, client: &ApiClient, storage: Arc<dyn Storage>) -> Watcher {
    let mut sinks: Vec<Arc<dyn NotificationSink>> = Vec::new();
    sinks.push(Arc::new(LogSink));
    if let Some(ref webhook) = config.slack_webhook_url {
        sinks.push(Arc::new(SlackSink::new(webhook.clone())));
    }

    let mut watcher = Watcher::new(sinks).with_channel(
        Channel::Alerts,
        Box::new(ActiveAlertsSource::new(
            client.clone(),
            &config.empresa_id,
            config.alerts_limit,
        )),
        SeenSetNotifier::load(storage.clone(), &config.storage_keys.alerts),
    );
    if config.watch_hardware {
        watcher = watcher.with_channel(
            Channel::Hardware,
            Box::new(HardwareIncidentsSource::new(client.clone())),
            SeenSetNotifier::load(storage, &config.storage_keys.hardware),
        );
    }
    watcher
}

async fn watch(
    config: &Config,
    client: &ApiClient,
    storage: Arc<dyn Storage>,
) -> Result<(), Box<dyn std::error::Error>> {
    let watcher = Arc::new(build_watcher(config, client, storage));
    let poller = Poller::start(watcher.clone(), config.poll_interval()).await;
    log_report(poller.initial_report());
    tracing::info!(
        empresa_id = %config.empresa_id,
        interval_secs = config.poll_interval_secs,
        channels = ?watcher.channels(),
        "watching for new items"
    );

    wait_for_shutdown(&poller).await?;
    poller.stop().await?;
    tracing::info!(badge = watcher.badge_count(), "stopped");
    Ok(())
}

/// SIGUSR1 pauses polling and SIGUSR2 resumes it, like a page going hidden
/// and visible again.
#[cfg(unix)]
async fn wait_for_shutdown(poller: &Poller) -> Result<(), Box<dyn std::error::Error>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut pause = signal(SignalKind::user_defined1())?;
    let mut resume = signal(SignalKind::user_defined2())?;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => return result.map_err(Into::into),
            _ = pause.recv() => poller.pause().await?,
            _ = resume.recv() => log_report(&poller.resume().await?),
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_poller: &Poller) -> Result<(), Box<dyn std::error::Error>> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

fn log_report(report: &PollReport) {
    match report {
        PollReport::Skipped => tracing::debug!("poll skipped"),
        PollReport::Completed(outcomes) => {
            for outcome in outcomes {
                tracing::debug!(?outcome, "poll outcome");
            }
        }
    }
}

async fn list(
    config: &Config,
    client: &ApiClient,
    resource: Resource,
) -> Result<(), Box<dyn std::error::Error>> {
    let empresa_id = &config.empresa_id;
    match resource {
        Resource::AlertTypes => {
            let records = client
                .list_records("/api/tipos-alarma?page=1&limit=200", Some("alert_types"))
                .await?;
            print_records(&records, AlertType::from_raw)?;
        }
        Resource::CompanyTypes => {
            let records = client
                .list_records("/api/tipos_empresa/dashboard/all", None)
                .await?;
            print_records(&records, CompanyType::from_raw)?;
        }
        Resource::Users => {
            let path = format!("/empresas/{}/usuarios/including-inactive", empresa_id);
            let records = client.list_records(&path, None).await?;
            print_records(&records, Usuario::from_raw)?;
        }
        Resource::Hardware => {
            let path = format!("/api/hardware/empresa/{}/including-inactive", empresa_id);
            let records = client.list_records(&path, None).await?;
            print_records(&records, HardwareRecord::from_raw)?;
        }
    }
    Ok(())
}

fn print_records<T, F>(records: &[Value], map: F) -> Result<(), serde_json::Error>
where
    T: Serialize,
    F: Fn(&Value) -> T,
{
    for record in records {
        println!("{}", serde_json::to_string(&map(record))?);
    }
    Ok(())
}
