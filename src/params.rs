use std::collections::HashSet;
use std::path::PathBuf;

use clap::Parser;

use crate::classify::VerdictPolicy;
use crate::error::Error;
use crate::evidence::EvidenceParams;
use crate::paf::AlignmentType;
use crate::select::AlignmentFilter;

// ---------------------------------------------------------------------------
// Run mode enum
// ---------------------------------------------------------------------------

/// `--run-mode` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Classify every sample's alignment file and write per-sample reports.
    Classify,
    /// Concatenate existing per-sample reports into run-level tables.
    Merge,
}

impl std::str::FromStr for RunMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "classify" => Ok(Self::Classify),
            "merge" => Ok(Self::Merge),
            _ => Err(format!(
                "unknown run mode '{s}'; expected 'classify' or 'merge'"
            )),
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Classify => write!(f, "classify"),
            Self::Merge => write!(f, "merge"),
        }
    }
}

// ---------------------------------------------------------------------------
// Insertion type
// ---------------------------------------------------------------------------

/// Organellar origin of the candidate insertions (`--type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertType {
    /// Nuclear mitochondrial DNA segments
    Numt,
    /// Nuclear plastid DNA segments
    Nupt,
}

impl InsertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numt => "numt",
            Self::Nupt => "nupt",
        }
    }
}

impl std::str::FromStr for InsertType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "numt" => Ok(Self::Numt),
            "nupt" => Ok(Self::Nupt),
            _ => Err(format!("unknown type '{s}'; expected 'numt' or 'nupt'")),
        }
    }
}

impl std::fmt::Display for InsertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Parameters struct
// ---------------------------------------------------------------------------

/// numtcheck command-line parameters.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "numtcheck",
    about = "Validate candidate NUMT/NUPT insertion regions from long-read PAF alignments",
    version
)]
pub struct Parameters {
    // ── Run ─────────────────────────────────────────────────────────────
    /// Run mode: classify or merge
    #[arg(long = "run-mode", default_value = "classify")]
    pub run_mode: RunMode,

    /// Insertion type: numt or nupt
    #[arg(long = "type")]
    pub insert_type: InsertType,

    /// Number of worker threads (samples are processed in parallel)
    #[arg(long = "threads", default_value_t = 1)]
    pub threads: usize,

    // ── Input ───────────────────────────────────────────────────────────
    /// Directory containing <sample>_<type>_mapped.paf files
    #[arg(long = "paf-dir")]
    pub paf_dir: Option<PathBuf>,

    /// Region metadata table (CSV with header)
    #[arg(long = "position-mapping-csv")]
    pub position_mapping_csv: Option<PathBuf>,

    /// Comma-separated sample IDs to process (default: all)
    #[arg(long = "samples", default_value = "")]
    pub samples: String,

    // ── Output ──────────────────────────────────────────────────────────
    /// Output root directory
    #[arg(long = "out-dir")]
    pub out_dir: PathBuf,

    /// Also write per-read diagnostic rows (read_details.tsv)
    #[arg(long = "write-read-details")]
    pub write_read_details: bool,

    /// Skip the combined all-sample outputs in classify mode
    #[arg(long = "no-combined")]
    pub no_combined: bool,

    // ── Alignment filtering ─────────────────────────────────────────────
    /// Minimum mapping quality
    #[arg(long = "mapq-min", default_value_t = 20)]
    pub mapq_min: u32,

    /// Comma-separated tp tags to include, e.g. P or P,S
    #[arg(long = "include-tp", default_value = "P")]
    pub include_tp: String,

    // ── Evidence thresholds ─────────────────────────────────────────────
    /// Max distance (bp) of a full-span alignment from either target end
    #[arg(long = "edge-window", default_value_t = 200)]
    pub edge_window: i64,

    /// Min fraction of the target covered by a full-span alignment
    #[arg(long = "min-target-cov", default_value_t = 0.95)]
    pub min_target_cov: f64,

    /// Min overlap (bp) with each of left flank, insert and right flank
    #[arg(long = "min-overlap-bp", default_value_t = 1)]
    pub min_overlap_bp: i64,

    /// Min insert overlap (bp) for single-junction evidence
    #[arg(long = "insert-min-overlap", default_value_t = 10000)]
    pub insert_min_overlap: i64,

    // ── Verdict policy ──────────────────────────────────────────────────
    /// Min supporting reads for a region to be validated
    #[arg(long = "min-support-reads", default_value_t = 2)]
    pub min_support_reads: usize,

    /// Extraction length above which the long-region policy applies
    #[arg(long = "long-region-threshold", default_value_t = 15000)]
    pub long_region_threshold: i64,
}

/// Everything a sample task needs to know about thresholds and outputs.
///
/// Built once per run and shared read-only between worker threads.
#[derive(Debug, Clone)]
pub struct ClassifyConfig {
    pub insert_type: InsertType,
    pub filter: AlignmentFilter,
    pub evidence: EvidenceParams,
    pub policy: VerdictPolicy,
    pub write_read_details: bool,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            insert_type: InsertType::Numt,
            filter: AlignmentFilter::default(),
            evidence: EvidenceParams::default(),
            policy: VerdictPolicy::default(),
            write_read_details: false,
        }
    }
}

/// Split a comma-separated option into trimmed, non-empty items.
fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

impl Parameters {
    /// Parsed `--include-tp` set.
    pub fn include_tags(&self) -> HashSet<AlignmentType> {
        split_list(&self.include_tp)
            .map(AlignmentType::from_tag_value)
            .collect()
    }

    /// Parsed `--samples` filter; `None` means every sample.
    pub fn sample_filter(&self) -> Option<HashSet<String>> {
        let keep: HashSet<String> = split_list(&self.samples).map(str::to_string).collect();
        if keep.is_empty() {
            None
        } else {
            Some(keep)
        }
    }

    /// Parsed `--samples` list in the order given.
    pub fn sample_list(&self) -> Vec<String> {
        split_list(&self.samples).map(str::to_string).collect()
    }

    pub fn classify_config(&self) -> ClassifyConfig {
        ClassifyConfig {
            insert_type: self.insert_type,
            filter: AlignmentFilter {
                mapq_min: self.mapq_min,
                include_tags: self.include_tags(),
            },
            evidence: EvidenceParams {
                edge_window: self.edge_window,
                min_target_cov: self.min_target_cov,
                min_overlap_bp: self.min_overlap_bp,
                insert_min_overlap_for_single_junction: self.insert_min_overlap,
            },
            policy: VerdictPolicy {
                min_support_reads: self.min_support_reads,
                long_region_threshold: self.long_region_threshold,
            },
            write_read_details: self.write_read_details,
        }
    }

    /// Validate parameter combinations that clap alone cannot enforce.
    pub fn validate(&self) -> Result<(), Error> {
        if self.run_mode == RunMode::Classify {
            if self.paf_dir.is_none() {
                return Err(Error::Parameter(
                    "--paf-dir is required when --run-mode classify".into(),
                ));
            }
            if self.position_mapping_csv.is_none() {
                return Err(Error::Parameter(
                    "--position-mapping-csv is required when --run-mode classify".into(),
                ));
            }
        }

        if self.threads == 0 {
            return Err(Error::Parameter("--threads must be >= 1".into()));
        }

        if self.min_support_reads == 0 {
            return Err(Error::Parameter("--min-support-reads must be >= 1".into()));
        }

        if !(0.0..=1.0).contains(&self.min_target_cov) {
            return Err(Error::Parameter(format!(
                "--min-target-cov must be within [0, 1], got {}",
                self.min_target_cov
            )));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
