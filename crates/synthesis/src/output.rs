//! Output encodings of the evaluation entries
//!
//! - nested JSON (pretty-printed, UTF-8 unescaped)
//! - long CSV: one row per (entry, language, rank)
//! - wide CSV: one row per (entry, language), cases spread over columns
//! - a deflate archive holding the three files

use crate::errors::Result;
use crate::processor::EvaluationEntry;
use crate::query::truncate_chars;
use lexbridge_common::config::SynthesisConfig;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Where each output of a run goes
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub json: PathBuf,
    pub long_csv: PathBuf,
    pub wide_csv: PathBuf,
    pub archive: PathBuf,
}

impl OutputPaths {
    pub fn from_config(config: &SynthesisConfig) -> Self {
        let dir = &config.output_dir;
        Self {
            json: dir.join(&config.json_file),
            long_csv: dir.join(&config.long_csv_file),
            wide_csv: dir.join(&config.wide_csv_file),
            archive: dir.join(&config.archive_file),
        }
    }
}

/// Write every encoding, then archive them
pub fn write_all(entries: &[EvaluationEntry], paths: &OutputPaths, wide_text_chars: usize) -> Result<()> {
    if let Some(parent) = paths.json.parent() {
        fs::create_dir_all(parent)?;
    }

    write_json(entries, &paths.json)?;
    write_long_csv(entries, &paths.long_csv)?;
    write_wide_csv(entries, &paths.wide_csv, wide_text_chars)?;
    write_archive(
        &[
            paths.json.as_path(),
            paths.long_csv.as_path(),
            paths.wide_csv.as_path(),
        ],
        &paths.archive,
    )
}

pub fn write_json(entries: &[EvaluationEntry], path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, entries)?;
    writer.flush()?;
    debug!(path = %path.display(), "JSON written");
    Ok(())
}

pub fn write_long_csv(entries: &[EvaluationEntry], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["query_lang", "query", "rank", "case_id", "case_text"])?;

    for entry in entries {
        for (lang, query) in entry.queries.iter() {
            for (i, case) in entry.relevant_cases.iter().enumerate() {
                let rank = (i + 1).to_string();
                writer.write_record([lang, query, rank.as_str(), case.case_id.as_str(), case.text.as_str()])?;
            }
        }
    }

    writer.flush()?;
    debug!(path = %path.display(), "Long CSV written");
    Ok(())
}

pub fn write_wide_csv(entries: &[EvaluationEntry], path: &Path, text_chars: usize) -> Result<()> {
    let width = entries
        .iter()
        .map(|e| e.relevant_cases.len())
        .max()
        .unwrap_or(0);

    let mut header = vec!["orig_q_index".to_string(), "lang".to_string(), "query".to_string()];
    for rank in 1..=width {
        header.push(format!("case_id_{}", rank));
        header.push(format!("case_text_{}", rank));
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&header)?;

    for (qi, entry) in entries.iter().enumerate() {
        for (lang, query) in entry.queries.iter() {
            let mut row = vec![qi.to_string(), lang.to_string(), query.to_string()];
            for rank in 0..width {
                match entry.relevant_cases.get(rank) {
                    Some(case) => {
                        row.push(case.case_id.to_string());
                        row.push(truncate_chars(&case.text, text_chars).to_string());
                    }
                    None => {
                        row.push(String::new());
                        row.push(String::new());
                    }
                }
            }
            writer.write_record(&row)?;
        }
    }

    writer.flush()?;
    debug!(path = %path.display(), width, "Wide CSV written");
    Ok(())
}

/// Deflate `files` into `archive`, each under its base name
pub fn write_archive(files: &[&Path], archive: &Path) -> Result<()> {
    let mut zip = ZipWriter::new(File::create(archive)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for file in files {
        let name = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("No file name in {}", file.display()),
                )
            })?;
        zip.start_file(name, options)?;
        io::copy(&mut File::open(file)?, &mut zip)?;
    }

    zip.finish()?;
    debug!(path = %archive.display(), files = files.len(), "Archive written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{MultilingualQuerySet, RelevantCase};
    use lexbridge_common::corpus::CaseId;
    use std::io::Read;

    fn case(id: &str, text: &str) -> RelevantCase {
        RelevantCase {
            case_id: CaseId::new(id),
            text: text.to_string(),
        }
    }

    fn sample_entries() -> Vec<EvaluationEntry> {
        let mut first = MultilingualQuerySet::new("which judgments concern bail?", "en");
        first.insert("hi", "जमानत से संबंधित निर्णय?");
        first.insert("ta", "");

        let mut second = MultilingualQuerySet::new("find precedents related to rent, arrears.", "en");
        second.insert("hi", "");
        second.insert("ta", "");

        vec![
            EvaluationEntry {
                queries: first,
                relevant_cases: vec![case("1", "Bail was refused."), case("2", "Bail granted")],
            },
            EvaluationEntry {
                queries: second,
                relevant_cases: vec![case("3", "Rent \"arrears\", eviction")],
            },
        ]
    }

    fn read_csv(path: &Path) -> Vec<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(path).unwrap();
        reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_long_csv_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.csv");
        write_long_csv(&sample_entries(), &path).unwrap();

        let rows = read_csv(&path);
        assert_eq!(rows[0], vec!["query_lang", "query", "rank", "case_id", "case_text"]);
        // 3 languages x 2 cases + 3 languages x 1 case
        assert_eq!(rows.len(), 1 + 6 + 3);
        assert_eq!(rows[1], vec!["en", "which judgments concern bail?", "1", "1", "Bail was refused."]);
        assert_eq!(rows[3][0], "hi");
        assert_eq!(rows[9][4], "Rent \"arrears\", eviction");
    }

    #[test]
    fn test_wide_csv_pads_to_widest_judgment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.csv");
        write_wide_csv(&sample_entries(), &path, 4).unwrap();

        let rows = read_csv(&path);
        assert_eq!(
            rows[0],
            vec!["orig_q_index", "lang", "query", "case_id_1", "case_text_1", "case_id_2", "case_text_2"]
        );
        assert_eq!(rows.len(), 1 + 3 + 3);
        assert_eq!(rows[1][3..], ["1", "Bail", "2", "Bail"]);
        assert_eq!(rows[4][0], "1");
        assert_eq!(rows[4][5..], ["", ""]);
    }

    #[test]
    fn test_json_is_nested_and_unescaped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eval.json");
        write_json(&sample_entries(), &path).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("जमानत"));

        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value[0]["queries"]["en"], "which judgments concern bail?");
        assert_eq!(value[0]["relevant_cases"][1]["case_id"], "2");
        assert_eq!(value[1]["queries"]["ta"], "");
    }

    #[test]
    fn test_write_all_archives_by_base_name() {
        let dir = tempfile::tempdir().unwrap();
        let config = SynthesisConfig {
            output_dir: dir.path().join("out"),
            ..Default::default()
        };
        let paths = OutputPaths::from_config(&config);
        write_all(&sample_entries(), &paths, 500).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&paths.archive).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["Eval_data.json", "Eval_data_long.csv", "Eval_data_wide_ids.csv"]
        );

        let mut json = String::new();
        archive
            .by_name("Eval_data.json")
            .unwrap()
            .read_to_string(&mut json)
            .unwrap();
        assert_eq!(json, fs::read_to_string(&paths.json).unwrap());
    }

    #[test]
    fn test_empty_run_still_writes_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.csv");
        write_wide_csv(&[], &path, 500).unwrap();
        assert_eq!(read_csv(&path), vec![vec!["orig_q_index", "lang", "query"]]);
    }
}
