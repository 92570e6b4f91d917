/// Run-level merge of per-sample reports
///
/// Concatenates `<out>/<type>/<sample>/region_validation.tsv` into
/// `all_samples_region_validation.tsv` (all tables must share one header)
/// and collects every `qc.json` into `qc_all_samples.json`.
use crate::error::Error;
use crate::output::{self, COMBINED_QC_NAME, COMBINED_REGION_TABLE_NAME, QC_NAME, REGION_TABLE_NAME};
use crate::params::InsertType;
use log::info;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// What a merge produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    pub region_tables: usize,
    pub qc_files: usize,
    pub rows: usize,
}

/// Sample sub-directories of `type_dir`, sorted by name.
fn list_sample_dirs(type_dir: &Path) -> Result<Vec<String>, Error> {
    let mut samples = Vec::new();
    for entry in fs::read_dir(type_dir).map_err(|e| Error::io(e, type_dir))? {
        let entry = entry.map_err(|e| Error::io(e, type_dir))?;
        if entry.path().is_dir() {
            samples.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    samples.sort();
    Ok(samples)
}

/// Read a TSV file into (header, data lines).
fn read_table(path: &Path) -> Result<(String, Vec<String>), Error> {
    let file = File::open(path).map_err(|e| Error::io(e, path))?;
    let mut lines = BufReader::new(file).lines();

    let header = match lines.next() {
        Some(line) => line.map_err(|e| Error::io(e, path))?,
        None => return Err(Error::Schema(format!("{} has no header", path.display()))),
    };
    let rows = lines
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| Error::io(e, path))?;
    Ok((header, rows))
}

/// Concatenate tables that must all carry the same header.
pub fn concat_tables(paths: &[PathBuf], dest: &Path) -> Result<usize, Error> {
    let Some(first) = paths.first() else {
        return Err(Error::MissingInput("no tables to concatenate".into()));
    };
    let (header, _) = read_table(first)?;

    let mut rows = Vec::new();
    for path in paths {
        let (src_header, src_rows) = read_table(path)?;
        if src_header != header {
            return Err(Error::Schema(format!("header mismatch in {}", path.display())));
        }
        rows.extend(src_rows);
    }

    let columns: Vec<&str> = header.split('\t').collect();
    output::write_tsv(dest, &columns, rows.as_slice())?;
    Ok(rows.len())
}

/// Merge the per-sample reports of one insertion type under `out_dir`.
///
/// `samples` restricts the merge to the listed samples (in that order);
/// an empty list means every sample directory present.
pub fn merge_reports(out_dir: &Path, insert_type: InsertType, samples: &[String]) -> Result<MergeSummary, Error> {
    let type_dir = out_dir.join(insert_type.as_str());
    if !type_dir.is_dir() {
        return Err(Error::io(
            std::io::Error::new(std::io::ErrorKind::NotFound, "output type directory not found"),
            &type_dir,
        ));
    }

    let samples = if samples.is_empty() {
        list_sample_dirs(&type_dir)?
    } else {
        samples.to_vec()
    };

    let mut region_paths = Vec::new();
    let mut qc_paths = Vec::new();
    for sample in &samples {
        let region_path = type_dir.join(sample).join(REGION_TABLE_NAME);
        let qc_path = type_dir.join(sample).join(QC_NAME);
        if region_path.is_file() {
            region_paths.push(region_path);
        }
        if qc_path.is_file() {
            qc_paths.push(qc_path);
        }
    }

    if region_paths.is_empty() {
        return Err(Error::MissingInput(format!(
            "no {} found under {}",
            REGION_TABLE_NAME,
            type_dir.display()
        )));
    }

    let rows = concat_tables(&region_paths, &type_dir.join(COMBINED_REGION_TABLE_NAME))?;

    let mut qc_all = Vec::with_capacity(qc_paths.len());
    for path in &qc_paths {
        let text = fs::read_to_string(path).map_err(|e| Error::io(e, path))?;
        let value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| Error::Json(format!("{}: {}", path.display(), e)))?;
        qc_all.push(value);
    }
    output::write_qc_list(&type_dir.join(COMBINED_QC_NAME), qc_all.as_slice())?;

    info!(
        "Merged {} region tables ({} rows) and {} QC files into {}",
        region_paths.len(),
        rows,
        qc_paths.len(),
        type_dir.display()
    );

    Ok(MergeSummary {
        region_tables: region_paths.len(),
        qc_files: qc_paths.len(),
        rows,
    })
}
