use chrono::NaiveDateTime;
use csv_map::{read, Columns, CsvRecord, TableConfig, Truthy};

#[derive(Debug, Default)]
struct Person {
    name: String,
    years: i32,
    developer: bool,
    registered: Option<NaiveDateTime>,
    nicks: Vec<String>,
}

impl CsvRecord for Person {
    fn table() -> Option<TableConfig> {
        Some(TableConfig::new("./data/people.csv.gz", ";"))
    }

    fn columns(columns: Columns<Self>) -> Columns<Self> {
        columns
            .scalar("name", "name", |p: &mut Self, v| p.name = v)
            .scalar("years", "years", |p: &mut Self, v| p.years = v)
            .truthy("developer", "developer", Truthy::new(["1", "sim", "yes"]), |p, v| {
                p.developer = v
            })
            .temporal("date", "registered", "yyyy-MM-dd HH:mm:ss", |p: &mut Self, v| {
                p.registered = Some(v)
            })
            .collection("nicks", "nicks", ",", |p: &mut Self, v| p.nicks = v)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let people = read::<Person>().await?;
    for p in &people {
        println!(
            "{} ({}) developer={} registered={:?} nicks={:?}",
            p.name, p.years, p.developer, p.registered, p.nicks
        );
    }
    Ok(())
}
