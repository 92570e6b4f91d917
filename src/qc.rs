/// Per-file QC counters and their JSON form
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::params::InsertType;
use crate::select::AlignmentFilter;

/// QC summary of one alignment file.
///
/// Fields are declared in alphabetical order so the JSON keys come out sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QcSummary {
    pub include_tp: Vec<String>,
    /// Records passing the MAPQ and tp filters
    pub kept_records: u64,
    /// Lines skipped for having fewer than 12 fields
    pub malformed_lines: u64,
    pub mapq_min: u32,
    /// Deduplicated pairs whose region has no metadata for this sample
    pub missing_region_meta: u64,
    pub paf_path: String,
    pub sample: String,
    pub tlen_vs_extr_length_max_abs_diff: u64,
    pub tlen_vs_extr_length_mismatch_count: u64,
    /// Records decoded from the file
    pub total_records: u64,
    #[serde(rename = "type")]
    pub insert_type: String,
    /// Distinct (read, region) pairs after deduplication
    pub unique_pairs: u64,
}

impl QcSummary {
    pub fn new(paf_path: &Path, sample: &str, insert_type: InsertType, filter: &AlignmentFilter) -> Self {
        Self {
            include_tp: filter.include_tags_sorted(),
            mapq_min: filter.mapq_min,
            paf_path: paf_path.display().to_string(),
            sample: sample.to_string(),
            insert_type: insert_type.to_string(),
            ..Self::default()
        }
    }

    pub fn record_seen(&mut self) {
        self.total_records += 1;
    }

    pub fn record_kept(&mut self) {
        self.kept_records += 1;
    }

    pub fn record_missing_meta(&mut self) {
        self.missing_region_meta += 1;
    }

    /// Compare an observed target length with the expected extraction length.
    pub fn record_target_length(&mut self, observed: i64, expected: i64) {
        let diff = observed.abs_diff(expected);
        if diff != 0 {
            self.tlen_vs_extr_length_mismatch_count += 1;
            self.tlen_vs_extr_length_max_abs_diff = self.tlen_vs_extr_length_max_abs_diff.max(diff);
        }
    }

    /// Print summary to log, with warnings for the recoverable problems.
    pub fn print_summary(&self) {
        info!("=== QC: {} ({}) ===", self.sample, self.paf_path);
        info!("Total records: {}", self.total_records);
        if self.total_records > 0 {
            info!(
                "Kept after mapq>={} / tp filter: {} ({:.2}%)",
                self.mapq_min,
                self.kept_records,
                100.0 * self.kept_records as f64 / self.total_records as f64
            );
        }
        info!("Unique read-region pairs: {}", self.unique_pairs);

        if self.missing_region_meta > 0 {
            warn!(
                "{}: {} read-region pairs reference regions without metadata",
                self.sample, self.missing_region_meta
            );
        }
        if self.tlen_vs_extr_length_mismatch_count > 0 {
            warn!(
                "{}: {} pairs have target length != extr_length (max |diff| = {})",
                self.sample,
                self.tlen_vs_extr_length_mismatch_count,
                self.tlen_vs_extr_length_max_abs_diff
            );
        }
        if self.malformed_lines > 0 {
            warn!(
                "{}: skipped {} PAF lines with fewer than 12 fields",
                self.sample, self.malformed_lines
            );
        }
    }

    /// Pretty JSON (two-space indent).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> QcSummary {
        QcSummary::new(
            Path::new("paf/S1_numt_mapped.paf"),
            "S1",
            InsertType::Numt,
            &AlignmentFilter::default(),
        )
    }

    #[test]
    fn test_new_summary() {
        let qc = summary();
        assert_eq!(qc.sample, "S1");
        assert_eq!(qc.insert_type, "numt");
        assert_eq!(qc.mapq_min, 20);
        assert_eq!(qc.include_tp, vec!["P".to_string()]);
        assert_eq!(qc.total_records, 0);
        assert_eq!(qc.paf_path, "paf/S1_numt_mapped.paf");
    }

    #[test]
    fn test_counters() {
        let mut qc = summary();
        qc.record_seen();
        qc.record_seen();
        qc.record_kept();
        qc.record_missing_meta();
        assert_eq!(qc.total_records, 2);
        assert_eq!(qc.kept_records, 1);
        assert_eq!(qc.missing_region_meta, 1);
    }

    #[test]
    fn test_target_length_mismatch() {
        let mut qc = summary();
        qc.record_target_length(5000, 5000);
        assert_eq!(qc.tlen_vs_extr_length_mismatch_count, 0);
        qc.record_target_length(5010, 5000);
        qc.record_target_length(4970, 5000);
        qc.record_target_length(5001, 5000);
        assert_eq!(qc.tlen_vs_extr_length_mismatch_count, 3);
        assert_eq!(qc.tlen_vs_extr_length_max_abs_diff, 30);
    }

    #[test]
    fn test_target_length_mismatch_extremes() {
        let mut qc = summary();
        qc.record_target_length(i64::MAX, i64::MIN);
        assert_eq!(qc.tlen_vs_extr_length_mismatch_count, 1);
        assert_eq!(qc.tlen_vs_extr_length_max_abs_diff, u64::MAX);

        qc.record_target_length(0, -1);
        assert_eq!(qc.tlen_vs_extr_length_mismatch_count, 2);
        assert_eq!(qc.tlen_vs_extr_length_max_abs_diff, u64::MAX);
    }

    #[test]
    fn test_json_keys_sorted() {
        let json = summary().to_json().unwrap();
        let keys: Vec<&str> = json
            .lines()
            .filter_map(|l| l.trim().strip_prefix('"'))
            .filter_map(|l| l.split_once("\":").map(|(k, _)| k))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert!(keys.contains(&"type"));
        assert!(json.starts_with("{\n  \""));
    }

    #[test]
    fn test_json_round_trip() {
        let mut qc = summary();
        qc.record_seen();
        qc.unique_pairs = 1;
        let back: QcSummary = serde_json::from_str(&qc.to_json().unwrap()).unwrap();
        assert_eq!(back, qc);
    }
}
