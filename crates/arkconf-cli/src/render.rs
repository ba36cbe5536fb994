//! User-facing output: one line per server or document, failures on stderr

use arkconf_core::{ConversionReport, ConversionStatus, Error};
use arkconf_sync::{Operation, SyncReport, SyncResult};
use colored::Colorize;
use serde_json::{json, Value};
use std::path::PathBuf;

use crate::cli::Format;

pub(crate) fn setup_error(err: &Error) {
    eprintln!("{} {}", "✗".red(), err);
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("{}: {}", "Error".red(), e),
    }
}

pub(crate) fn sync_report(report: &SyncReport, format: Format) {
    if format == Format::Json {
        print_json(&report.to_json());
        return;
    }

    for result in report.results() {
        sync_line(result);
    }

    let failed = report.failures().count();
    if failed > 0 {
        eprintln!(
            "\n{} of {} server(s) failed",
            failed,
            report.results().len()
        );
    }
}

fn sync_line(result: &SyncResult) {
    let verb = match result.operation {
        Operation::Pull => "pulled",
        Operation::Push => "pushed",
    };

    match &result.error {
        None => {
            let files = if result.transferred.is_empty() {
                "nothing".to_string()
            } else {
                result.transferred.join(", ")
            };
            let mut line = format!("{} {}: {} {}", "✓".green(), result.server, verb, files);
            if !result.skipped.is_empty() {
                let skipped = format!(" (missing locally: {})", result.skipped.join(", "));
                line.push_str(&skipped.dimmed().to_string());
            }
            println!("{}", line);
        }
        Some(err) => {
            eprintln!("{} {}: {}", "✗".red(), result.server, err);
            if !result.transferred.is_empty() {
                eprintln!("    {} before the failure: {}", verb, result.transferred.join(", "));
            }
        }
    }
}

pub(crate) fn conversion_report(command: &str, report: &ConversionReport, format: Format) {
    if format == Format::Json {
        print_json(&conversion_json(command, report));
        return;
    }

    for include in &report.includes {
        println!("{} include {}", "✓".green(), include.display());
    }
    for include in &report.unused_includes {
        println!(
            "{} include {} is no longer referenced",
            "!".yellow(),
            include.display()
        );
    }
    for outcome in &report.outcomes {
        let label = format!("{}/{}", outcome.server, outcome.file);
        match &outcome.status {
            ConversionStatus::Converted(path) => {
                println!("{} {} -> {}", "✓".green(), label, path.display())
            }
            ConversionStatus::Skipped(reason) => {
                println!("{} {}: {}", "-".dimmed(), label, reason.dimmed())
            }
            ConversionStatus::Failed(err) => eprintln!("{} {}: {}", "✗".red(), label, err),
        }
    }

    let failed = report.failures().count();
    if failed > 0 {
        eprintln!("\n{} {} document(s) failed", command, failed);
    }
}

pub(crate) fn conversion_json(command: &str, report: &ConversionReport) -> Value {
    let outcomes: Vec<Value> = report
        .outcomes
        .iter()
        .map(|outcome| {
            let mut entry = json!({
                "server": outcome.server,
                "file": outcome.file,
            });
            let detail = match &outcome.status {
                ConversionStatus::Converted(path) => json!({
                    "status": "converted",
                    "path": path.display().to_string(),
                }),
                ConversionStatus::Skipped(reason) => json!({
                    "status": "skipped",
                    "reason": reason,
                }),
                ConversionStatus::Failed(err) => json!({
                    "status": "failed",
                    "error": { "kind": err.kind.name(), "message": err.to_string() },
                }),
            };
            if let (Some(entry), Value::Object(detail)) = (entry.as_object_mut(), detail) {
                entry.extend(detail);
            }
            entry
        })
        .collect();

    json!({
        "operation": command,
        "outcomes": outcomes,
        "includes": paths(&report.includes),
        "unused_includes": paths(&report.unused_includes),
    })
}

fn paths(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|p| p.display().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arkconf_core::ConversionOutcome;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_conversion_json() {
        let report = ConversionReport {
            outcomes: vec![
                ConversionOutcome {
                    server: "Island".into(),
                    file: "Game.ini".into(),
                    status: ConversionStatus::Converted(PathBuf::from("configs/ini/Island/Game.ini")),
                },
                ConversionOutcome {
                    server: "Island".into(),
                    file: "GameUserSettings.ini".into(),
                    status: ConversionStatus::Skipped("no hierarchical document".into()),
                },
                ConversionOutcome {
                    server: "Ragnarok".into(),
                    file: "Game.ini".into(),
                    status: ConversionStatus::Failed(Error::unresolved_variable("ADMIN_PASS")),
                },
            ],
            includes: Vec::new(),
            unused_includes: vec![PathBuf::from("configs/yml/includes/Game.S.yml")],
        };

        let value = conversion_json("dump", &report);

        assert_eq!(value["operation"], "dump");
        assert_eq!(value["outcomes"][0]["status"], "converted");
        assert_eq!(value["outcomes"][0]["path"], "configs/ini/Island/Game.ini");
        assert_eq!(value["outcomes"][1]["reason"], "no hierarchical document");
        assert_eq!(value["outcomes"][2]["server"], "Ragnarok");
        assert_eq!(value["outcomes"][2]["error"]["kind"], "unresolved_variable");
        assert_eq!(value["includes"], json!([]));
        assert_eq!(value["unused_includes"], json!(["configs/yml/includes/Game.S.yml"]));
    }
}
