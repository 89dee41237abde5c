use async_compression::tokio::write::GzipEncoder;
use chrono::NaiveDateTime;
use csv_map::{
    read, read_from_path, read_from_reader, Columns, CsvMapError, CsvRecord, SchemaError,
    SourceMeta, TableConfig, Truthy,
};
use std::{fs::File, io::Write};
use tokio::io::AsyncWriteExt;

#[derive(Debug, Default, PartialEq)]
struct Person {
    name: String,
    years: i32,
    developer: bool,
    registered: Option<NaiveDateTime>,
    nicks: Vec<String>,
}

impl CsvRecord for Person {
    fn table() -> Option<TableConfig> {
        Some(TableConfig::new("does/not/exist/people.csv", ";"))
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

#[derive(Debug, Default)]
struct Unconfigured {
    name: String,
}

impl CsvRecord for Unconfigured {
    fn columns(columns: Columns<Self>) -> Columns<Self> {
        columns.scalar("name", "name", |u: &mut Self, v| u.name = v)
    }
}

#[tokio::test]
async fn reads_gzip_file_in_source_order() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let gz_path = dir.path().join("people.csv.gz");

    let mut encoder = GzipEncoder::new(tokio::fs::File::create(&gz_path).await?);
    encoder
        .write_all(b"name;years;developer;date;nicks\n")
        .await?;
    for i in 0..10_000 {
        let developer = if i % 2 == 0 { "YES" } else { "no" };
        let years = i % 90;
        let line = format!("P{i:05};{years};{developer};2023-01-05 10:00:00;a{i},b{i}\n");
        encoder.write_all(line.as_bytes()).await?;
    }
    encoder.shutdown().await?;

    let people = read_from_path::<Person>(&gz_path).await?;
    assert_eq!(people.len(), 10_000);
    assert_eq!(people[0].name, "P00000");
    assert!(people[0].developer);
    assert!(!people[1].developer);
    assert_eq!(people[9_999].name, "P09999");
    assert_eq!(people[9_999].nicks, vec!["a9999".to_string(), "b9999".to_string()]);
    Ok(())
}

#[tokio::test]
async fn scenario_rows_from_plain_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let csv_path = dir.path().join("people.csv");
    let mut f = File::create(&csv_path)?;
    writeln!(f, "name;years;developer;date;nicks")?;
    writeln!(f, "Ana;30;yes;2023-01-05 10:00:00;alice,bob")?;
    writeln!(f, "Bia;41;NO;2023-01-05 10:00:00;carol")?;
    writeln!(f, "Caio;22;1")?;
    drop(f);

    let people = read_from_path::<Person>(&csv_path).await?;
    assert_eq!(people.len(), 3);
    assert_eq!(
        people[0],
        Person {
            name: "Ana".into(),
            years: 30,
            developer: true,
            registered: NaiveDateTime::parse_from_str("2023-01-05 10:00:00", "%Y-%m-%d %H:%M:%S")
                .ok(),
            nicks: vec!["alice".into(), "bob".into()],
        }
    );
    assert!(!people[1].developer);
    assert_eq!(people[2].registered, None);
    assert!(people[2].nicks.is_empty());
    Ok(())
}

#[tokio::test]
async fn reads_non_utf8_charset_from_any_reader() -> anyhow::Result<()> {
    let bytes: &'static [u8] =
        b"name;years;developer;date;nicks\r\nJos\xE9;50;sim;2021-12-31 23:59:59;Z\xE9\r\n";
    let meta = SourceMeta::default().with_charset(encoding_rs::WINDOWS_1252);
    let people = read_from_reader::<Person, _>(bytes, &meta).await?;
    assert_eq!(people[0].name, "José");
    assert_eq!(people[0].nicks, vec!["Zé".to_string()]);
    Ok(())
}

#[tokio::test]
async fn empty_file_has_no_header_line() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("empty.csv");
    File::create(&path)?;

    let err = read_from_path::<Person>(&path).await.unwrap_err();
    assert!(matches!(err, CsvMapError::EmptyHeaderLine));
    Ok(())
}

#[tokio::test]
async fn coercion_failure_aborts_the_read() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("bad.csv");
    std::fs::write(&path, "name;years\nAna;30\nBo;old\nCid;3\n")?;

    // the header lacks three bound columns, so this fails before any row
    let err = read_from_path::<Person>(&path).await.unwrap_err();
    assert!(matches!(err, CsvMapError::UnknownColumn(_)));

    std::fs::write(
        &path,
        "name;years;developer;date;nicks\nAna;30\nBo;old\nCid;3\n",
    )?;
    let err = read_from_path::<Person>(&path).await.unwrap_err();
    assert!(matches!(err, CsvMapError::Coercion { line: 3, .. }));
    Ok(())
}

#[tokio::test]
async fn configured_path_is_used_by_read() {
    let err = read::<Person>().await.unwrap_err();
    match err {
        CsvMapError::Open { path, .. } => assert!(path.ends_with("people.csv")),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn missing_table_config_is_fatal() {
    let err = read::<Unconfigured>().await.unwrap_err();
    assert!(matches!(
        err,
        CsvMapError::Schema(SchemaError::MissingTableConfig { .. })
    ));
}
