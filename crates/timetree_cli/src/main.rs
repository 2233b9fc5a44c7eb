//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `timetree_core` linkage end to end against an in-memory store.
//! - Print the resolved calendar path for the current instant.
//!
//! Usage: `timetree_cli [resolution] [time_zone]`, defaults `day` and `UTC`.
//! Set `TIMETREE_LOG_DIR` to an absolute directory to enable file logging.

use std::process::ExitCode;
use timetree_core::db::open_db_in_memory;
use timetree_core::{
    default_log_level, init_logging, parse_time_zone, CalendarNode, Granularity,
    SqliteGraphStore, TimeTree,
};

const LOG_DIR_ENV: &str = "TIMETREE_LOG_DIR";

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("timetree_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    if let Ok(log_dir) = std::env::var(LOG_DIR_ENV) {
        init_logging(default_log_level(), &log_dir)?;
    }

    let mut args = std::env::args().skip(1);
    let resolution = match args.next() {
        Some(value) => value.parse::<Granularity>()?,
        None => Granularity::Day,
    };
    let time_zone = match args.next() {
        Some(value) => parse_time_zone(&value)?,
        None => timetree_core::Tz::UTC,
    };

    println!("timetree_core version={}", timetree_core::core_version());

    let conn = open_db_in_memory()?;
    let store = SqliteGraphStore::try_new(&conn)?;
    let tree = TimeTree::new(store);
    let node = tree.get_now_with(time_zone, resolution)?;

    let mut path = vec![node];
    let mut cursor = node;
    while let Some(parent) = tree.parent_of(cursor.id)? {
        path.push(parent);
        cursor = parent;
    }
    path.reverse();

    for node in &path {
        println!("{}", render(node));
    }
    Ok(())
}

fn render(node: &CalendarNode) -> String {
    match node.value {
        Some(value) => format!("{} {} id={}", node.granularity, value, node.id),
        None => format!("{} id={}", node.granularity, node.id),
    }
}
