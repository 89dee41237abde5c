use chrono::NaiveDateTime;
use clap::{Arg, ArgAction, Command};
use csv_map::{read_from_path, Columns, CsvRecord, TableConfig, Truthy};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Layout written by `gen`.
#[derive(Debug, Default)]
struct Person {
    name: String,
    years: u32,
    developer: bool,
    registered: Option<NaiveDateTime>,
    nicks: Vec<String>,
}

impl CsvRecord for Person {
    fn table() -> Option<TableConfig> {
        Some(TableConfig::new("people.csv", ";"))
    }

    fn columns(columns: Columns<Self>) -> Columns<Self> {
        columns
            .scalar("name", "name", |p: &mut Self, v| p.name = v)
            .scalar("years", "years", |p: &mut Self, v| p.years = v)
            .truthy(
                "developer",
                "developer",
                Truthy::new(["1", "sim", "yes"]),
                |p, v| p.developer = v,
            )
            .temporal("date", "registered", "yyyy-MM-dd HH:mm:ss", |p: &mut Self, v| {
                p.registered = Some(v)
            })
            .collection("nicks", "nicks", ",", |p: &mut Self, v| p.nicks = v)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let matches = Command::new("bench")
        .arg(
            Arg::new("path")
                .long("path")
                .value_parser(clap::value_parser!(PathBuf))
                .required(true),
        )
        .arg(
            Arg::new("fast-local")
                .long("fast-local")
                .help("Use the mmap path for local uncompressed UTF-8 files (feature: fast_local)")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let path = matches
        .get_one::<PathBuf>("path")
        .ok_or_else(|| anyhow::anyhow!("Provide --path <file>"))?;

    let start = Instant::now();

    #[cfg(feature = "fast_local")]
    let people: Vec<Person> = if matches.get_flag("fast-local") {
        csv_map::fast_local_read(Some(path.as_path()))?
    } else {
        read_from_path(path).await?
    };
    #[cfg(not(feature = "fast_local"))]
    let people: Vec<Person> = {
        if matches.get_flag("fast-local") {
            tracing::warn!("built without feature fast_local; using the streaming path");
        }
        read_from_path(path).await?
    };

    let elapsed = start.elapsed().as_secs_f64();
    let rps = (people.len() as f64) / elapsed;
    let developers = people.iter().filter(|p| p.developer).count();
    let nicks: usize = people.iter().map(|p| p.nicks.len()).sum();
    let dated = people.iter().filter(|p| p.registered.is_some()).count();
    let max_years = people.iter().map(|p| p.years).max().unwrap_or_default();

    info!(
        source = %path.display(),
        rows = people.len(),
        developers,
        nicks,
        dated,
        max_years,
        first = people.first().map(|p| p.name.as_str()).unwrap_or(""),
        "decoded"
    );
    println!(
        "source={} rows={}\nelapsed={:.1}s rows/sec={:.0}",
        path.display(),
        people.len(),
        elapsed,
        rps
    );
    Ok(())
}
