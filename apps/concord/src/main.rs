use std::time::Duration;

use anyhow::{Context as _, Result, bail};
use clap::Parser;
use concord_memory::{DirectoryQuery, MemoryReplica, Recorder, directory_protocol};
use concord_protocol::{Context, ReconcileError, Report, reconcile};
use serde_json::{Value, json};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "concord")]
#[command(about = "Reconcile a directory query across in-memory replicas")]
struct Cli {
    /// Read replicas placed in front of the write replica.
    #[arg(long, default_value_t = 2)]
    replicas: usize,
    /// How many read replicas have not yet seen the newest user.
    #[arg(long, default_value_t = 0)]
    lagging: usize,
    /// Give the first read replica a conflicting user role.
    #[arg(long)]
    diverge: bool,
    /// Name search terms for the lookup property.
    #[arg(long, default_value = "ada")]
    terms: Vec<String>,
    /// Simulated per-access latency of each read replica.
    #[arg(long, default_value_t = 10)]
    latency_ms: u64,
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json_logs: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).compact().init();
    }
}

const NEWEST_USER: &str = "u4";

fn seed_document() -> Value {
    json!({
        "users": {
            "u1": {"name": "Ada Lovelace", "role": "admin"},
            "u2": {"name": "Grace Hopper", "role": "staff"},
            "u3": {"name": "Ada Yonath", "role": "staff"},
            NEWEST_USER: {"name": "Barbara Liskov", "role": "staff"}
        },
        "settings": {"theme": "dark", "locale": "en", "retention_days": 30}
    })
}

/// Read replicas first, the write replica last.
fn build_replicas(cli: &Cli) -> Vec<MemoryReplica> {
    let latency = Duration::from_millis(cli.latency_ms);
    let mut replicas: Vec<MemoryReplica> = (0..cli.replicas)
        .map(|index| {
            let mut document = seed_document();
            if index < cli.lagging {
                if let Some(users) = document["users"].as_object_mut() {
                    users.remove(NEWEST_USER);
                }
                document["settings"]["retention_days"] = json!(7);
            }
            if cli.diverge && index == 0 {
                document["users"]["u2"]["role"] = json!("admin");
            }
            MemoryReplica::new(format!("read-{index}"), document).latency(latency)
        })
        .collect();
    replicas.push(MemoryReplica::new("write", seed_document()));
    replicas
}

fn build_query(cli: &Cli) -> DirectoryQuery {
    let mut query = DirectoryQuery::new()
        .schema()
        .user("u1", &["name", "role"])
        .user("u2", &["role"])
        .user(NEWEST_USER, &["name"])
        .user("u9", &["name"])
        .setting("theme")
        .setting("retention_days");
    for terms in &cli.terms {
        query = query.lookup(terms.as_str(), "role");
    }
    query
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let replicas = build_replicas(&cli);
    let handles: Vec<&MemoryReplica> = replicas.iter().collect();
    let protocol = directory_protocol();
    let query = build_query(&cli);
    info!(
        replicas = handles.len(),
        lagging = cli.lagging,
        diverge = cli.diverge,
        "reconciling directory query"
    );

    let answer = match reconcile(&protocol, &query, &handles).await {
        Ok(answer) => answer,
        Err(ReconcileError::Reduce(failure)) => {
            warn!(%failure, shape = ?failure.shape(), "replicas are inconsistent");
            bail!("replicas are inconsistent: {failure}");
        }
        Err(error) => return Err(error).context("reconcile failed"),
    };

    let recorder = Recorder::new();
    protocol
        .process_result(&recorder, &answer, Context::root())
        .await;
    info!(events = recorder.len(), "result reported");

    println!("{}", serde_json::to_string_pretty(&answer)?);
    Ok(())
}
