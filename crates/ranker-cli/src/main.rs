use std::env;
use std::net::SocketAddr;

use contracts::{IdentityRecord, RankConfig};
use ranker_api::{serve, EngineApi, SqliteStore};

fn print_usage() {
    println!("ranker-cli <command>");
    println!("commands:");
    println!("  status [sqlite_path]");
    println!("  pass [sqlite_path]");
    println!("  flush [sqlite_path]");
    println!("  seed-demo [sqlite_path]");
    println!("  serve [addr] [sqlite_path]");
    println!("    default addr: 127.0.0.1:8080");
    println!("  default sqlite_path: {}", default_sqlite_path());
}

fn default_sqlite_path() -> String {
    env::var("RANKER_SQLITE_PATH")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "ranker.sqlite".to_string())
}

fn parse_sqlite_path(value: Option<&String>) -> String {
    value
        .map(String::to_string)
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(default_sqlite_path)
}

fn parse_socket_addr(value: Option<&String>) -> Result<SocketAddr, String> {
    let raw = value.map(String::as_str).unwrap_or("127.0.0.1:8080");
    raw.parse::<SocketAddr>()
        .map_err(|_| format!("invalid addr: {raw}"))
}

fn open_api(sqlite_path: &str) -> Result<EngineApi, String> {
    let mut api = EngineApi::new(RankConfig::default());
    api.attach_store(sqlite_path)
        .map_err(|err| format!("failed to open sqlite store {sqlite_path}: {err}"))?;
    Ok(api)
}

fn run_pass(args: &[String]) -> Result<(), String> {
    let sqlite_path = parse_sqlite_path(args.get(2));
    let mut api = open_api(&sqlite_path)?;
    let report = api.run_pass().map_err(|err| format!("pass failed: {err}"))?;

    let king = report
        .snapshot
        .king
        .map(|id| id.to_string())
        .unwrap_or_else(|| "none".to_string());
    println!(
        "ranked {} identities, king={}, promotions={}",
        report.snapshot.entries.len(),
        king,
        report.promotions.len()
    );
    for event in &report.promotions {
        println!(
            "  promoted {}: rank {} -> {} ({})",
            event.id, event.old_rank, event.new_rank, event.title
        );
    }
    Ok(())
}

fn run_flush(args: &[String]) -> Result<(), String> {
    let sqlite_path = parse_sqlite_path(args.get(2));
    let mut api = open_api(&sqlite_path)?;
    let flushed = api
        .flush_presence()
        .map_err(|err| format!("flush failed: {err}"))?;
    println!("flushed {flushed} records into {sqlite_path}");
    Ok(())
}

fn run_status(args: &[String]) -> Result<(), String> {
    let sqlite_path = parse_sqlite_path(args.get(2));
    let api = open_api(&sqlite_path)?;
    let status = api.status();
    let encoded = serde_json::to_string_pretty(&status)
        .map_err(|err| format!("failed to encode status: {err}"))?;
    println!("{encoded}");
    Ok(())
}

/// Write a small demo community so a pass has input to chew on.
fn run_seed_demo(args: &[String]) -> Result<(), String> {
    let sqlite_path = parse_sqlite_path(args.get(2));
    let store = SqliteStore::open(&sqlite_path)
        .map_err(|err| format!("failed to open sqlite store {sqlite_path}: {err}"))?;

    let identities = [
        (101, 900_000.0, 400_000.0, 700, 24),
        (102, 700_000.0, 900_000.0, 650, 22),
        (103, 500_000.0, 100_000.0, 400, 14),
        (104, 250_000.0, 300_000.0, 300, 10),
        (105, 120_000.0, 80_000.0, 120, 4),
        (106, 30_000.0, 10_000.0, 20, 1),
    ];
    for (id, chat, game, days, months) in identities {
        store
            .upsert_identity(&IdentityRecord {
                id,
                chat_seconds: chat,
                game_seconds: game,
                tenure_days: days,
                tenure_months: months,
                last_active_at: 0,
            })
            .map_err(|err| format!("failed to seed identity {id}: {err}"))?;
    }

    let pairs = [
        (101, 102, 350_000.0),
        (101, 103, 90_000.0),
        (102, 104, 120_000.0),
        (104, 105, 40_000.0),
        (105, 106, 8_000.0),
    ];
    for (lo, hi, game_seconds) in pairs {
        store
            .accumulate_game_time(lo, hi, game_seconds)
            .map_err(|err| format!("failed to seed pair {lo}-{hi}: {err}"))?;
    }

    println!(
        "seeded {} identities and {} pairs into {sqlite_path}",
        identities.len(),
        pairs.len()
    );
    Ok(())
}

async fn run_serve(args: &[String]) -> Result<(), String> {
    let addr = parse_socket_addr(args.get(2))?;
    let sqlite_path = parse_sqlite_path(args.get(3));
    let api = open_api(&sqlite_path)?;
    println!("serving on {addr} with store {sqlite_path}");
    serve(addr, api)
        .await
        .map_err(|err| format!("server failed: {err}"))
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);

    let result = match command {
        Some("status") => run_status(&args),
        Some("pass") => run_pass(&args),
        Some("flush") => run_flush(&args),
        Some("seed-demo") => run_seed_demo(&args),
        Some("serve") => run_serve(&args).await,
        _ => {
            print_usage();
            Ok(())
        }
    };

    if let Err(message) = result {
        eprintln!("{message}");
        std::process::exit(1);
    }
}
