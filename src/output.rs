use std::io::{self, Write};

use serde::Serialize;

use crate::app::{InspectResult, ListResult, ProgressEvent, ProgressSink};
use crate::pipeline::BuildReport;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_build(report: &BuildReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_list(result: &ListResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_inspect(result: &InspectResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Progress lines on stderr, so stdout stays clean for summaries.
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("{} ({:.2}s)", event.message, elapsed.as_secs_f64()),
            None => eprintln!("{}", event.message),
        }
    }
}

pub fn print_build_summary(report: &BuildReport) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}pathway-index summary{reset}");
    println!("{green}built targets: {}{reset}", report.built.len());
    println!("{green}artifacts written: {}{reset}", report.artifacts.len());
    for failed in &report.failed {
        println!("{yellow}failed {}: {}{reset}", failed.target, failed.message);
    }
    for failure in &report.chromosome_failures {
        println!(
            "{yellow}chromosome {} incomplete: {}{reset}",
            failure.chromosome, failure.message
        );
    }
}

pub fn print_list(result: &ListResult) {
    let Some(species) = &result.species else {
        println!("no index built in {}", result.output_dir);
        return;
    };
    println!(
        "{} ({species}, built {})",
        result.output_dir,
        result.built_at.as_deref().unwrap_or("unknown")
    );
    for entry in &result.artifacts {
        let marker = if entry.present { " " } else { "!" };
        println!("{marker} {:<32} {:>9} entries", entry.name, entry.entries);
    }
}

pub fn print_inspect(result: &InspectResult) -> io::Result<()> {
    let mut stdout = io::stdout();
    writeln!(
        stdout,
        "{} (schema {}, {} entries)",
        result.name, result.schema_version, result.entries
    )?;
    for entry in &result.sample {
        writeln!(stdout, "{entry}")?;
    }
    Ok(())
}
