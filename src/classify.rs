/// Per-region aggregation of evidence and the final validation verdict
use crate::evidence::Evidence;
use crate::region::RegionMeta;
use std::collections::{HashMap, HashSet};

/// Extraction length at or below which a region is "short".
pub const DEFAULT_LONG_REGION_THRESHOLD: i64 = 15_000;

/// Validation level assigned to a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValidationLevel {
    NotValidated,
    ValidatedFullSpan,
    ValidatedSingleJunction,
}

impl ValidationLevel {
    pub const ALL: [ValidationLevel; 3] = [
        Self::NotValidated,
        Self::ValidatedFullSpan,
        Self::ValidatedSingleJunction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotValidated => "Not_Validated",
            Self::ValidatedFullSpan => "Validated_Full_Span",
            Self::ValidatedSingleJunction => "Validated_Single_Junction",
        }
    }
}

impl std::fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-support thresholds for the final verdict.
///
/// Short regions (`extr_length <= long_region_threshold`) need
/// `min_support_reads` full-span reads; single-junction reads are ignored.
/// Long regions are validated by a single full-span read, or failing that by
/// `min_support_reads` single-junction reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerdictPolicy {
    pub min_support_reads: usize,
    pub long_region_threshold: i64,
}

impl Default for VerdictPolicy {
    fn default() -> Self {
        Self {
            min_support_reads: 2,
            long_region_threshold: DEFAULT_LONG_REGION_THRESHOLD,
        }
    }
}

impl VerdictPolicy {
    pub fn is_long(&self, extr_length: i64) -> bool {
        extr_length > self.long_region_threshold
    }

    pub fn decide(&self, extr_length: i64, n_full_span: usize, n_single_junction: usize) -> ValidationLevel {
        if !self.is_long(extr_length) {
            if n_full_span >= self.min_support_reads {
                ValidationLevel::ValidatedFullSpan
            } else {
                ValidationLevel::NotValidated
            }
        } else if n_full_span >= 1 {
            ValidationLevel::ValidatedFullSpan
        } else if n_single_junction >= self.min_support_reads {
            ValidationLevel::ValidatedSingleJunction
        } else {
            ValidationLevel::NotValidated
        }
    }
}

/// Evidence folded so far for one region.
#[derive(Debug, Clone, Default)]
pub struct RegionAccumulator {
    full_span_reads: HashSet<String>,
    single_junction_reads: HashSet<String>,
    max_target_cov: f64,
    max_insert_overlap: i64,
    n_pairs: usize,
    /// Target length of the most recently observed pair
    last_target_length: Option<i64>,
}

impl RegionAccumulator {
    pub fn observe(&mut self, query_name: &str, evidence: &Evidence, target_length: i64) {
        self.n_pairs += 1;
        self.max_target_cov = self.max_target_cov.max(evidence.target_cov);
        self.max_insert_overlap = self.max_insert_overlap.max(evidence.insert_overlap);
        self.last_target_length = Some(target_length);

        if evidence.full_span {
            self.full_span_reads.insert(query_name.to_string());
        }
        if evidence.single_junction {
            self.single_junction_reads.insert(query_name.to_string());
        }
    }

    pub fn n_full_span_reads(&self) -> usize {
        self.full_span_reads.len()
    }

    pub fn n_single_junction_reads(&self) -> usize {
        self.single_junction_reads.len()
    }
}

/// Final per-region result.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionVerdict {
    pub region_id: String,
    pub level: ValidationLevel,
    pub n_full_span_reads: usize,
    pub n_single_junction_reads: usize,
    pub max_target_cov: f64,
    pub max_insert_overlap: i64,
    pub n_pairs: usize,
    /// Observed target length; `None` when no pair touched the region
    pub target_length: Option<i64>,
}

/// Folds (read, region) evidence into per-region accumulators.
#[derive(Debug, Default)]
pub struct RegionClassifier {
    regions: HashMap<String, RegionAccumulator>,
}

impl RegionClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, region_id: &str, query_name: &str, evidence: &Evidence, target_length: i64) {
        self.regions
            .entry(region_id.to_string())
            .or_default()
            .observe(query_name, evidence, target_length);
    }

    pub fn accumulator(&self, region_id: &str) -> Option<&RegionAccumulator> {
        self.regions.get(region_id)
    }

    /// Verdict for one region; regions never observed get empty support.
    pub fn verdict(&self, meta: &RegionMeta, policy: &VerdictPolicy) -> RegionVerdict {
        let empty = RegionAccumulator::default();
        let acc = self.regions.get(&meta.region_id).unwrap_or(&empty);
        let n_full = acc.n_full_span_reads();
        let n_sj = acc.n_single_junction_reads();

        RegionVerdict {
            region_id: meta.region_id.clone(),
            level: policy.decide(meta.extr_length, n_full, n_sj),
            n_full_span_reads: n_full,
            n_single_junction_reads: n_sj,
            max_target_cov: acc.max_target_cov,
            max_insert_overlap: acc.max_insert_overlap,
            n_pairs: acc.n_pairs,
            target_length: acc.last_target_length,
        }
    }

    /// Verdicts for every region of a sample, in the order given.
    pub fn finalize(self, regions: &[RegionMeta], policy: &VerdictPolicy) -> Vec<RegionVerdict> {
        regions.iter().map(|m| self.verdict(m, policy)).collect()
    }
}
