/// Alignment filtering and per-(read, region) best-alignment selection
use crate::paf::{AlignmentRecord, AlignmentType};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::HashSet;

/// MAPQ and alignment-type filter applied before deduplication.
#[derive(Debug, Clone)]
pub struct AlignmentFilter {
    /// Alignments below this mapping quality are dropped
    pub mapq_min: u32,
    /// Accepted `tp` values; alignments without a tag are always accepted
    pub include_tags: HashSet<AlignmentType>,
}

impl Default for AlignmentFilter {
    fn default() -> Self {
        Self {
            mapq_min: 20,
            include_tags: HashSet::from([AlignmentType::Primary]),
        }
    }
}

impl AlignmentFilter {
    pub fn accepts(&self, aln: &AlignmentRecord) -> bool {
        if aln.mapq < self.mapq_min {
            return false;
        }
        match &aln.alignment_type {
            Some(tp) => self.include_tags.contains(tp),
            None => true,
        }
    }

    /// Accepted tag values as sorted strings (for reports).
    pub fn include_tags_sorted(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .include_tags
            .iter()
            .map(|t| t.as_str().to_string())
            .collect();
        tags.sort();
        tags
    }
}

/// Rank two alignments of the same (read, region) pair.
///
/// Longer target span first, then longer alignment block, then higher MAPQ.
/// `Equal` means neither dominates; callers keep the earlier one.
pub fn compare_alignments(a: &AlignmentRecord, b: &AlignmentRecord) -> Ordering {
    a.target_span()
        .cmp(&b.target_span())
        .then(a.alignment_length.cmp(&b.alignment_length))
        .then(a.mapq.cmp(&b.mapq))
}

/// Key of a deduplicated pair: (query name, region id).
pub type PairKey = (String, String);

/// Best alignment per (read, region) pair, in order of first appearance.
#[derive(Debug, Default)]
pub struct BestAlignments {
    slots: HashMap<PairKey, usize>,
    pairs: Vec<(PairKey, AlignmentRecord)>,
}

impl BestAlignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer an (already filtered) alignment.
    ///
    /// Replaces the current best of its pair only if strictly better.
    pub fn offer(&mut self, aln: AlignmentRecord) {
        let key = (aln.query_name.clone(), aln.region_id().to_string());
        match self.slots.get(&key) {
            Some(&slot) => {
                let current = &mut self.pairs[slot].1;
                if compare_alignments(&aln, current) == Ordering::Greater {
                    *current = aln;
                }
            }
            None => {
                self.slots.insert(key.clone(), self.pairs.len());
                self.pairs.push((key, aln));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn get(&self, query_name: &str, region_id: &str) -> Option<&AlignmentRecord> {
        let key = (query_name.to_string(), region_id.to_string());
        self.slots.get(&key).map(|&slot| &self.pairs[slot].1)
    }

    /// Pairs in order of first appearance.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &AlignmentRecord)> {
        self.pairs
            .iter()
            .map(|((q, r), aln)| (q.as_str(), r.as_str(), aln))
    }
}
