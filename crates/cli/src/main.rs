use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use souk_api::{InProcApi, MarketApi};
use souk_core::SearchQuery;
use souk_realtime::{ConnectionState, RealtimeChannel, RealtimeConfig};
use souk_search::SuggestConfig;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "soukctl", version, about = "Souk CLI")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// List categories with their subcategories
    Categories,
    /// Show the posting form fields of a category
    Fields {
        /// Category name, e.g. "Vehicles"
        category: String,
    },
    /// Resolve a free-text query to a category
    Resolve { query: String },
    /// Search-assist suggestions for a query
    Suggest {
        query: String,
        #[arg(long = "location")]
        location: Option<String>,
        #[arg(long = "limit", allow_negative_numbers = true)]
        limit: Option<i64>,
    },
    /// Trending searches, optionally scoped to a city
    Trending {
        #[arg(long = "city")]
        city: Option<String>,
        #[arg(long = "limit", allow_negative_numbers = true)]
        limit: Option<i64>,
        /// Record these queries first (repeatable)
        #[arg(long = "seed")]
        seed: Vec<String>,
    },
    /// Sponsored ads for a query
    Ads {
        query: String,
        #[arg(long = "city")]
        city: Option<String>,
        #[arg(long = "limit", allow_negative_numbers = true)]
        limit: Option<i64>,
    },
    /// Connect a realtime channel to the in-process hub and print pushed events
    Listen {
        #[arg(long = "user")]
        user: String,
        /// Publish this many ping events after connecting
        #[arg(long = "ping", default_value_t = 3)]
        ping: usize,
        /// Give up waiting for an event after this many seconds
        #[arg(long = "timeout", default_value_t = 5)]
        timeout_secs: u64,
    },
}

fn init_tracing() {
    let env = std::env::var("SOUK_LOG").unwrap_or_else(|_| "warn".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("SOUK_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            warn!(addr = %addr, "invalid SOUK_METRICS_ADDR; expected host:port");
        }
    }
}

fn print_json<T: serde::Serialize>(v: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(v)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let api = InProcApi::builtin(SuggestConfig::from_env())?;

    match cli.command {
        Commands::Categories => {
            let cats = api.categories().await?;
            match cli.output {
                Output::Human => {
                    for c in cats {
                        println!("{} • {}", c.id, c.subcategories.join(", "));
                    }
                }
                Output::Json => print_json(&cats)?,
            }
        }
        Commands::Fields { category } => {
            let fields = api.fields(&category).await?;
            match cli.output {
                Output::Human => {
                    for f in fields {
                        let opts = f.options.map(|o| format!(" [{}]", o.join("|"))).unwrap_or_default();
                        println!("{:<16} {:<24} {:?}{}", f.name, f.label, f.input, opts);
                    }
                }
                Output::Json => print_json(&fields)?,
            }
        }
        Commands::Resolve { query } => {
            let cat = api.resolve(&query).await?;
            match cli.output {
                Output::Human => println!("{}", cat.map(|c| c.to_string()).unwrap_or_else(|| "-".into())),
                Output::Json => print_json(&cat)?,
            }
        }
        Commands::Suggest { query, location, limit } => {
            let q = SearchQuery { text: query, location, limit };
            let res = api.suggest(q).await?;
            match cli.output {
                Output::Human => {
                    println!("category: {}", res.category.as_ref().map(|c| c.as_str()).unwrap_or("-"));
                    for s in &res.suggestions {
                        println!("{:<9} {}", format!("{:?}", s.origin).to_lowercase(), s.text);
                    }
                    println!("{} suggestions in {} ms", res.suggestions.len(), res.meta.took_ms);
                }
                Output::Json => print_json(&res)?,
            }
        }
        Commands::Trending { city, limit, seed } => {
            let service = api.service();
            for s in &seed {
                let q = SearchQuery { text: s.clone(), location: city.clone(), limit: None };
                if let Err(e) = service.record_search(&q).await {
                    warn!(error = %e, query = %s, "seed failed");
                }
            }
            let top = api.trending(city.as_deref(), limit).await?;
            match cli.output {
                Output::Human => {
                    for (i, q) in top.iter().enumerate() {
                        println!("{:>2}. {}", i + 1, q);
                    }
                }
                Output::Json => print_json(&top)?,
            }
        }
        Commands::Ads { query, city, limit } => {
            let ads = api.ads(SearchQuery { text: query, location: city, limit }).await?;
            match cli.output {
                Output::Human => {
                    for a in ads {
                        println!("{} • {} • {} • {}", a.id, a.category, a.title, a.url);
                    }
                }
                Output::Json => print_json(&ads)?,
            }
        }
        Commands::Listen { user, ping, timeout_secs } => {
            let cfg = RealtimeConfig::from_env().context("realtime configuration")?;
            let channel = RealtimeChannel::new(cfg, api.hub());
            let mut handle = channel.connect(Some(&user)).await;
            let mut status = handle.status_receiver();
            let wait = Duration::from_secs(timeout_secs);
            tokio::time::timeout(wait, status.wait_for(|s| s.state == ConnectionState::Connected))
                .await
                .context("timed out connecting")?
                .context("channel closed")?;
            info!(user = %user, "listening");

            for seq in 0..ping {
                api.notify(&user, "ping", serde_json::json!({ "seq": seq })).await?;
                match tokio::time::timeout(wait, handle.recv()).await {
                    Ok(Some(ev)) => match cli.output {
                        Output::Human => println!("{} {} {}", ev.at.to_rfc3339(), ev.topic, ev.payload),
                        Output::Json => println!("{}", serde_json::to_string(&ev)?),
                    },
                    Ok(None) => break,
                    Err(_) => {
                        warn!(seq, "no event before timeout");
                        break;
                    }
                }
            }
            channel.disconnect().await;
        }
    }
    Ok(())
}
