use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use gestar_core::db::Database;
use gestar_core::models::{ReportKind, ReportRequest};
use gestar_core::quick_access::QrEncoder;
use gestar_core::report::{ReportCompiler, ReportConfig};

use super::helpers::parse_period;

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_report(
    db: &Database,
    config: &ReportConfig,
    kind: ReportKind,
    owner: &str,
    start: Option<String>,
    end: Option<String>,
    output: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    #[derive(Serialize)]
    struct ReportOutput {
        path: String,
        filename: String,
        pages: usize,
        bytes: usize,
    }

    let (start, end) = parse_period(start, end)?;
    let request = ReportRequest {
        owner_id: owner.to_string(),
        start,
        end,
        kind,
    };
    let encoder = QrEncoder;
    let report = ReportCompiler::new(db, db, config)
        .with_encoder(&encoder)
        .compile(&request)?;

    // A directory output keeps the generated file name.
    let path = match output {
        Some(p) if p.is_dir() => p.join(&report.filename),
        Some(p) => p,
        None => PathBuf::from(&report.filename),
    };
    std::fs::write(&path, &report.bytes)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;

    if json {
        let out = ReportOutput {
            path: path.display().to_string(),
            filename: report.filename,
            pages: report.page_count,
            bytes: report.bytes.len(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "Wrote {} ({} page{}, {start} to {end})",
            path.display(),
            report.page_count,
            if report.page_count == 1 { "" } else { "s" }
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gestar_core::models::NewOwner;

    #[test]
    fn writes_report_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        db.insert_owner(&NewOwner {
            id: "u1".to_string(),
            name: "Ana".to_string(),
            due_date: None,
        })
        .unwrap();

        cmd_report(
            &db,
            &ReportConfig::default(),
            ReportKind::Patient,
            "u1",
            Some("2024-01-01".to_string()),
            Some("2024-01-07".to_string()),
            Some(dir.path().to_path_buf()),
            true,
        )
        .unwrap();

        let written: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(written.len(), 1);
        assert!(written[0].starts_with("relatorio-glicemia-u1-"));
        let bytes = std::fs::read(dir.path().join(&written[0])).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn unknown_owner_fails() {
        let db = Database::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = cmd_report(
            &db,
            &ReportConfig::default(),
            ReportKind::Clinician,
            "ghost",
            None,
            None,
            Some(dir.path().join("out.pdf")),
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("ghost"));
        assert!(!dir.path().join("out.pdf").exists());
    }

    #[test]
    fn period_over_limit_fails_without_writing() {
        let db = Database::open_in_memory().unwrap();
        db.insert_owner(&NewOwner {
            id: "u1".to_string(),
            name: "Ana".to_string(),
            due_date: None,
        })
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.pdf");
        let err = cmd_report(
            &db,
            &ReportConfig::default(),
            ReportKind::Clinician,
            "u1",
            Some("2020-01-01".to_string()),
            Some("2024-12-31".to_string()),
            Some(out.clone()),
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("exceeds the limit of 366 days"));
        assert!(!out.exists());
    }
}
