use clap::{Arg, Command};
use std::io::{self, Write};

const NAMES: [&str; 6] = ["Ana", "Bruno", "Carla", "Davi", "Elisa", "Fabio"];
const TRUTHY: [&str; 6] = ["yes", "no", "1", "0", "sim", "NAO"];

fn main() -> anyhow::Result<()> {
    let matches = Command::new("gen")
        .about("Writes a synthetic people CSV (name;years;developer;date;nicks) to stdout")
        .arg(
            Arg::new("rows")
                .long("rows")
                .value_parser(clap::value_parser!(u64))
                .required(true),
        )
        .arg(
            Arg::new("no_header")
                .long("no-header")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(Arg::new("delim").long("delim").default_value(";"))
        .arg(Arg::new("nick_delim").long("nick-delim").default_value(","))
        .get_matches();

    let rows: u64 = *matches.get_one("rows").expect("required by clap");
    let with_header = !matches.get_flag("no_header");
    let delim = matches.get_one::<String>("delim").expect("has default");
    let nick_delim = matches.get_one::<String>("nick_delim").expect("has default");

    let mut out = io::BufWriter::new(io::stdout().lock());

    if with_header {
        writeln!(&mut out, "name{d}years{d}developer{d}date{d}nicks", d = delim)?;
    }

    // Deterministic data so bench runs are comparable
    for i in 0..rows {
        let name = NAMES[(i % NAMES.len() as u64) as usize];
        let years = 18 + i % 60;
        let developer = TRUTHY[(i % TRUTHY.len() as u64) as usize];
        let day = 1 + i % 28;
        let hour = i % 24;
        writeln!(
            &mut out,
            "{name}{i}{d}{years}{d}{developer}{d}2023-01-{day:02} {hour:02}:00:00{d}n{i}a{nd}n{i}b",
            d = delim,
            nd = nick_delim,
        )?;
        if i % 10_000 == 0 {
            out.flush()?;
        } // keep buffers moving on huge runs
    }

    out.flush()?;
    Ok(())
}
