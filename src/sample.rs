/// Per-sample pipeline: parse → filter → dedup → evidence → aggregate
use crate::classify::{RegionClassifier, RegionVerdict, ValidationLevel};
use crate::error::Error;
use crate::evidence::compute_evidence;
use crate::output::{self, READ_DETAIL_HEADER, REGION_HEADER};
use crate::paf::{sample_from_path, AlignmentRecord, PafReader};
use crate::params::{ClassifyConfig, InsertType};
use crate::qc::QcSummary;
use crate::region::RegionIndex;
use crate::select::{AlignmentFilter, BestAlignments};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Everything produced for one sample, held in memory until written.
#[derive(Debug, Clone)]
pub struct SampleReport {
    pub sample: String,
    pub verdicts: Vec<RegionVerdict>,
    /// Rendered region_validation.tsv rows, in metadata order
    pub region_rows: Vec<String>,
    /// Rendered read_details.tsv rows; empty unless requested
    pub read_detail_rows: Vec<String>,
    pub qc: QcSummary,
}

impl SampleReport {
    /// Number of regions at each validation level.
    pub fn tally(&self) -> Vec<(ValidationLevel, usize)> {
        ValidationLevel::ALL
            .iter()
            .map(|&level| {
                let n = self.verdicts.iter().filter(|v| v.level == level).count();
                (level, n)
            })
            .collect()
    }

    /// Write region table, QC JSON and (if present) read details into `dir`.
    pub fn write(&self, dir: &Path, write_read_details: bool) -> Result<(), Error> {
        output::ensure_dir(dir)?;
        if write_read_details {
            output::write_tsv(
                &dir.join(output::READ_DETAILS_NAME),
                &READ_DETAIL_HEADER,
                self.read_detail_rows.as_slice(),
            )?;
        }
        output::write_qc(&dir.join(output::QC_NAME), &self.qc)?;
        output::write_tsv(
            &dir.join(output::REGION_TABLE_NAME),
            &REGION_HEADER,
            self.region_rows.as_slice(),
        )?;
        Ok(())
    }
}

/// Apply the MAPQ/tp filter and keep the best alignment per (read, region).
pub fn select_best<I>(records: I, filter: &AlignmentFilter, qc: &mut QcSummary) -> Result<BestAlignments, Error>
where
    I: IntoIterator<Item = Result<AlignmentRecord, Error>>,
{
    let mut best = BestAlignments::new();
    for aln in records {
        let aln = aln?;
        qc.record_seen();
        if !filter.accepts(&aln) {
            continue;
        }
        qc.record_kept();
        best.offer(aln);
    }
    qc.unique_pairs = best.len() as u64;
    Ok(best)
}

/// Classify an already-opened record stream for one sample.
pub fn classify_records<I>(
    sample: &str,
    paf_path: &Path,
    records: I,
    index: &RegionIndex,
    config: &ClassifyConfig,
) -> Result<SampleReport, Error>
where
    I: IntoIterator<Item = Result<AlignmentRecord, Error>>,
{
    let mut qc = QcSummary::new(paf_path, sample, config.insert_type, &config.filter);
    let best = select_best(records, &config.filter, &mut qc)?;
    Ok(score_pairs(sample, best, qc, index, config))
}

/// Score deduplicated pairs and fold them into per-region verdicts.
fn score_pairs(
    sample: &str,
    best: BestAlignments,
    mut qc: QcSummary,
    index: &RegionIndex,
    config: &ClassifyConfig,
) -> SampleReport {
    let type_label = config.insert_type.as_str();
    let mut classifier = RegionClassifier::new();
    let mut read_detail_rows = Vec::new();

    for (query_name, region_id, aln) in best.iter() {
        let Some(meta) = index.get(sample, region_id) else {
            qc.record_missing_meta();
            continue;
        };

        qc.record_target_length(aln.target_length, meta.extr_length);

        let evidence = compute_evidence(aln, meta, &config.evidence);
        classifier.observe(region_id, query_name, &evidence, aln.target_length);

        if config.write_read_details {
            read_detail_rows.push(output::format_read_detail_row(
                sample, type_label, region_id, aln, &evidence,
            ));
        }
    }

    let regions = index.regions_for(sample);
    let verdicts = classifier.finalize(regions, &config.policy);
    let region_rows = regions
        .iter()
        .zip(&verdicts)
        .map(|(meta, verdict)| output::format_region_row(sample, type_label, meta, verdict))
        .collect();

    SampleReport {
        sample: sample.to_string(),
        verdicts,
        region_rows,
        read_detail_rows,
        qc,
    }
}

/// Classify one sample's alignment file.
pub fn classify_sample(paf_path: &Path, index: &RegionIndex, config: &ClassifyConfig) -> Result<SampleReport, Error> {
    let sample = sample_from_path(paf_path);
    info!("Classifying sample {} from {}", sample, paf_path.display());

    if index.regions_for(&sample).is_empty() {
        warn!("sample {} has no regions in the metadata table", sample);
    }

    let mut reader = PafReader::open(paf_path)?;
    let mut report = classify_records(&sample, paf_path, &mut reader, index, config)?;
    report.qc.malformed_lines = reader.malformed_lines();
    debug!(
        "{}: {} records, {} kept, {} pairs",
        sample, report.qc.total_records, report.qc.kept_records, report.qc.unique_pairs
    );

    report.qc.print_summary();
    for (level, n) in report.tally() {
        info!("{}: {} = {}", sample, level, n);
    }
    Ok(report)
}

/// Whether a file name looks like `<sample>_<type>_mapped.paf[.gz]`.
pub fn is_paf_for_type(file_name: &str, insert_type: InsertType) -> bool {
    let suffix = format!("_{}_mapped.paf", insert_type);
    let stem = file_name.strip_suffix(".gz").unwrap_or(file_name);
    stem.len() > suffix.len() && stem.ends_with(&suffix)
}

/// Alignment files of one insertion type in `dir`, sorted by path.
///
/// With a sample filter, only files whose sample prefix is listed are kept.
pub fn discover_paf_files(
    dir: &Path,
    insert_type: InsertType,
    samples: Option<&HashSet<String>>,
) -> Result<Vec<PathBuf>, Error> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::io(e, dir))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(e, dir))?;
        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| is_paf_for_type(n, insert_type));
        if matches && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    if paths.is_empty() {
        return Err(Error::MissingInput(format!(
            "no PAF files matched in {} for type {}",
            dir.display(),
            insert_type
        )));
    }

    if let Some(keep) = samples {
        paths.retain(|p| keep.contains(&sample_from_path(p)));
        if paths.is_empty() {
            let mut wanted: Vec<&String> = keep.iter().collect();
            wanted.sort();
            return Err(Error::MissingInput(format!(
                "no PAF files matched requested samples: {:?}",
                wanted
            )));
        }
    }

    Ok(paths)
}
