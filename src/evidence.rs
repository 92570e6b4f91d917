/// Per-alignment evidence against a region's extraction geometry
///
/// An extraction target `[0, tlen)` is split into three consecutive intervals:
///
/// ```text
///   0          left_flank                    tlen - right_flank        tlen
///   |-- left --|------------ insert ------------|------- right ---------|
/// ```
use crate::paf::AlignmentRecord;
use crate::region::RegionMeta;

/// Thresholds used when scoring one alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceParams {
    /// Max distance of a full-span alignment from each target end
    pub edge_window: i64,
    /// Min target coverage for full-span evidence
    pub min_target_cov: f64,
    /// Min overlap with each sub-interval for full-span evidence
    pub min_overlap_bp: i64,
    /// Min insert overlap for single-junction evidence
    pub insert_min_overlap_for_single_junction: i64,
}

impl Default for EvidenceParams {
    fn default() -> Self {
        Self {
            edge_window: 200,
            min_target_cov: 0.95,
            min_overlap_bp: 1,
            insert_min_overlap_for_single_junction: 10000,
        }
    }
}

/// Length of the intersection of `[a0, a1)` and `[b0, b1)`, at least 0.
#[inline]
pub fn overlap_len(a0: i64, a1: i64, b0: i64, b1: i64) -> i64 {
    a1.min(b1).saturating_sub(a0.max(b0)).max(0)
}

/// Left flank / insert / right flank partition of one extraction target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionGeometry {
    pub target_length: i64,
    pub left_flank: i64,
    pub right_flank: i64,
    pub insert_start: i64,
    pub insert_end: i64,
}

impl RegionGeometry {
    /// Flanks are clamped into `[0, target_length]`; the insert end never
    /// precedes the insert start.
    pub fn new(target_length: i64, left_flank: i64, right_flank: i64) -> Self {
        let upper = target_length.max(0);
        let left_flank = left_flank.clamp(0, upper);
        let right_flank = right_flank.clamp(0, upper);
        let insert_start = left_flank;
        let insert_end = target_length.saturating_sub(right_flank).max(insert_start);
        Self {
            target_length,
            left_flank,
            right_flank,
            insert_start,
            insert_end,
        }
    }

    pub fn for_alignment(aln: &AlignmentRecord, meta: &RegionMeta) -> Self {
        Self::new(aln.target_length, meta.left_flank, meta.right_flank)
    }

    pub fn left_overlap(&self, start: i64, end: i64) -> i64 {
        overlap_len(start, end, 0, self.left_flank)
    }

    pub fn insert_overlap(&self, start: i64, end: i64) -> i64 {
        overlap_len(start, end, self.insert_start, self.insert_end)
    }

    pub fn right_overlap(&self, start: i64, end: i64) -> i64 {
        overlap_len(start, end, self.insert_end, self.target_length)
    }
}

/// Evidence derived from one (alignment, region) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evidence {
    pub target_cov: f64,
    pub insert_overlap: i64,
    pub full_span: bool,
    pub single_junction: bool,
}

/// Score one alignment against its region.
pub fn compute_evidence(
    aln: &AlignmentRecord,
    meta: &RegionMeta,
    params: &EvidenceParams,
) -> Evidence {
    let geom = RegionGeometry::for_alignment(aln, meta);
    evaluate(&geom, aln.target_start, aln.target_end, params)
}

/// Score an aligned target interval `[tstart, tend)` against a geometry.
pub fn evaluate(geom: &RegionGeometry, tstart: i64, tend: i64, params: &EvidenceParams) -> Evidence {
    let tlen = geom.target_length;
    let target_cov = if tlen > 0 {
        tend.saturating_sub(tstart) as f64 / tlen as f64
    } else {
        0.0
    };

    let min_overlap = params.min_overlap_bp;
    let insert_overlap = geom.insert_overlap(tstart, tend);
    let left_ok = geom.left_flank == 0 || geom.left_overlap(tstart, tend) >= min_overlap;
    let insert_ok = insert_overlap >= min_overlap;
    let right_ok = geom.right_flank == 0 || geom.right_overlap(tstart, tend) >= min_overlap;

    let full_span = target_cov >= params.min_target_cov
        && tstart <= params.edge_window
        && tend >= tlen.saturating_sub(params.edge_window)
        && left_ok
        && insert_ok
        && right_ok;

    // Strictly straddling a boundary; touching it is not enough
    let crosses_left = tstart < geom.insert_start && tend > geom.insert_start;
    let crosses_right = tstart < geom.insert_end && tend > geom.insert_end;
    let single_junction = insert_overlap >= params.insert_min_overlap_for_single_junction
        && (crosses_left || crosses_right);

    Evidence {
        target_cov,
        insert_overlap,
        full_span,
        single_junction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> EvidenceParams {
        EvidenceParams::default()
    }

    #[test]
    fn test_overlap_len() {
        assert_eq!(overlap_len(0, 10, 5, 20), 5);
        assert_eq!(overlap_len(0, 10, 10, 20), 0);
        assert_eq!(overlap_len(0, 10, 20, 30), 0);
        assert_eq!(overlap_len(5, 6, 0, 100), 1);
    }

    #[test]
    fn test_overlap_len_extreme_coordinates() {
        assert_eq!(overlap_len(i64::MIN, i64::MAX, 0, 10), 10);
        assert_eq!(overlap_len(i64::MAX - 1, i64::MAX, i64::MIN, 0), 0);
        assert_eq!(overlap_len(i64::MIN, 0, 0, i64::MAX), 0);
    }

    #[test]
    fn test_evaluate_extreme_values_do_not_overflow() {
        let g = RegionGeometry::new(i64::MAX, 1000, 1000);
        let ev = evaluate(&g, 0, i64::MAX, &params());
        assert_eq!(ev.target_cov, 1.0);
        assert!(ev.full_span);

        let p = EvidenceParams {
            edge_window: i64::MAX,
            ..params()
        };
        let g = RegionGeometry::new(1000, 100, 100);
        let ev = evaluate(&g, i64::MIN, 1000, &p);
        assert_eq!(ev.insert_overlap, 800);
        assert!(ev.target_cov > 1.0);
    }

    #[test]
    fn test_geometry_partition() {
        let g = RegionGeometry::new(20000, 2000, 3000);
        assert_eq!(g.insert_start, 2000);
        assert_eq!(g.insert_end, 17000);
        assert_eq!(g.right_overlap(0, 20000), 3000);
        assert_eq!(g.left_overlap(0, 20000), 2000);
        assert_eq!(g.insert_overlap(0, 20000), 15000);
    }

    #[test]
    fn test_geometry_clamps_flanks() {
        let g = RegionGeometry::new(1000, 1500, -5);
        assert_eq!(g.left_flank, 1000);
        assert_eq!(g.right_flank, 0);
        assert_eq!(g.insert_start, 1000);
        assert_eq!(g.insert_end, 1000);

        // Flanks that overlap each other collapse the insert
        let g = RegionGeometry::new(1000, 700, 700);
        assert_eq!(g.insert_start, 700);
        assert_eq!(g.insert_end, 700);
        assert!(g.insert_start <= g.insert_end);
    }

    #[test]
    fn test_zero_length_target() {
        let g = RegionGeometry::new(0, 100, 100);
        let ev = evaluate(&g, 0, 0, &params());
        assert_eq!(ev.target_cov, 0.0);
        assert!(!ev.single_junction);
    }

    #[test]
    fn test_full_span_whole_target() {
        let g = RegionGeometry::new(20000, 1000, 1000);
        let ev = evaluate(&g, 0, 20000, &params());
        assert_eq!(ev.target_cov, 1.0);
        assert_eq!(ev.insert_overlap, 18000);
        assert!(ev.full_span);
        assert!(ev.single_junction);
    }

    #[test]
    fn test_min_target_cov_boundary() {
        let g = RegionGeometry::new(1000, 100, 100);

        let at = evaluate(&g, 0, 950, &params());
        assert!(at.target_cov >= 0.95);
        assert!(at.full_span);

        let below = evaluate(&g, 0, 949, &params());
        assert!(below.target_cov < 0.95);
        assert!(!below.full_span);
    }

    #[test]
    fn test_min_target_cov_epsilon_below() {
        let p = EvidenceParams {
            min_target_cov: 0.5 + f64::EPSILON,
            ..params()
        };
        let g = RegionGeometry::new(1000, 100, 100);
        let ev = evaluate(&g, 0, 500, &p);
        assert_eq!(ev.target_cov, 0.5);
        assert!(!ev.full_span);

        let p = EvidenceParams {
            min_target_cov: 0.5,
            edge_window: 600,
            ..params()
        };
        let no_right_flank = RegionGeometry::new(1000, 100, 0);
        assert!(evaluate(&no_right_flank, 0, 500, &p).full_span);
    }

    #[test]
    fn test_edge_window() {
        let g = RegionGeometry::new(10000, 1000, 1000);
        assert!(evaluate(&g, 200, 10000, &params()).full_span);
        assert!(!evaluate(&g, 201, 10000, &params()).full_span);
        assert!(evaluate(&g, 0, 9800, &params()).full_span);
        assert!(!evaluate(&g, 0, 9799, &params()).full_span);
    }

    #[test]
    fn test_full_span_requires_flank_overlap() {
        let p = EvidenceParams {
            min_overlap_bp: 150,
            ..params()
        };
        // Only 100 bp of the left flank is covered
        let g = RegionGeometry::new(10000, 200, 1000);
        let ev = evaluate(&g, 100, 10000, &p);
        assert!(ev.target_cov >= 0.95);
        assert!(!ev.full_span);

        // Zero-length flank is trivially satisfied
        let g = RegionGeometry::new(10000, 0, 1000);
        assert!(evaluate(&g, 100, 10000, &p).full_span);
    }

    #[test]
    fn test_single_junction_right() {
        let g = RegionGeometry::new(20000, 1000, 1000);
        let ev = evaluate(&g, 8000, 19500, &params());
        assert_eq!(ev.insert_overlap, 11000);
        assert!(ev.single_junction);
        assert!(!ev.full_span);
    }

    #[test]
    fn test_single_junction_left() {
        let g = RegionGeometry::new(20000, 1000, 1000);
        let ev = evaluate(&g, 500, 12000, &params());
        assert_eq!(ev.insert_overlap, 11000);
        assert!(ev.single_junction);
    }

    #[test]
    fn test_contained_alignment_is_not_single_junction() {
        let g = RegionGeometry::new(40000, 1000, 1000);
        let ev = evaluate(&g, 2000, 30000, &params());
        assert_eq!(ev.insert_overlap, 28000);
        assert!(!ev.single_junction);

        // Touching the boundary exactly does not count as straddling
        let ev = evaluate(&g, 1000, 39000, &params());
        assert!(!ev.single_junction);
    }

    #[test]
    fn test_single_junction_needs_insert_overlap() {
        let g = RegionGeometry::new(20000, 1000, 1000);
        let ev = evaluate(&g, 15000, 20000, &params());
        assert_eq!(ev.insert_overlap, 4000);
        assert!(!ev.single_junction);
    }

    #[test]
    fn test_compute_evidence_uses_observed_target_length() {
        let meta = RegionMeta {
            sample: "S1".into(),
            region_id: "r1".into(),
            category: "numt".into(),
            orig_chrom: "chr1".into(),
            orig_start: 0,
            orig_end: 0,
            orig_length: 0,
            extr_chrom: "chr1".into(),
            extr_start: 0,
            extr_end: 5000,
            extr_length: 5000,
            left_flank: 1000,
            right_flank: 1000,
            total_flank: 2000,
        };
        let aln = AlignmentRecord {
            query_name: "q".into(),
            query_length: 6000,
            query_start: 0,
            query_end: 6000,
            strand: '-',
            target_name: "r1::x".into(),
            target_length: 6000,
            target_start: 0,
            target_end: 6000,
            n_matches: 5900,
            alignment_length: 6000,
            mapq: 60,
            alignment_type: None,
        };
        let ev = compute_evidence(&aln, &meta, &params());
        assert_eq!(ev.insert_overlap, 4000);
        assert!(ev.full_span);
    }
}
