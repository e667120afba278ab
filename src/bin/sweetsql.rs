use rusqlite::types::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use sweetsql::config::{default_config_path, load_config};
use sweetsql::{ConnectOptions, Connection, Result, SweetError, TracingSink};
use tracing::info;

const USAGE: &str = "usage: sweetsql [--config FILE] <dsn> <sql> [params...]";

fn main() -> ExitCode {
    // Logs go to stderr so that stdout only carries results
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<()> {
    let (config_path, rest) = match args {
        [flag, path, rest @ ..] if flag == "--config" => (Some(PathBuf::from(path)), rest),
        _ => (None, args),
    };
    let [dsn, sql, params @ ..] = rest else {
        return Err(SweetError::Usage(USAGE.to_string()));
    };

    let connection = match config_path.or_else(|| default_config_path().filter(|p| p.exists())) {
        Some(path) => {
            info!("Using configuration from {:?}", path);
            let mut config = load_config(path)?;
            config.connection.dsn = dsn.clone();
            config.connect()?
        }
        None => Connection::open(dsn, "", "", ConnectOptions::default(), Some(Arc::new(TracingSink)))?,
    };

    let params: Vec<Value> = params.iter().map(|p| parse_param(p)).collect();
    let recordset = connection.select(sql.as_str(), params)?;

    if recordset.columns().is_empty() {
        println!("{} rows affected", recordset.row_count());
    } else {
        for row in recordset {
            println!("{}", row?.to_json());
        }
    }
    Ok(())
}

/// Integers and reals are bound as numbers, `NULL` as null, anything else as text
fn parse_param(raw: &str) -> Value {
    if raw == "NULL" {
        Value::Null
    } else if let Ok(i) = raw.parse::<i64>() {
        Value::Integer(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::Real(f)
    } else {
        Value::Text(raw.to_string())
    }
}
