/// Region metadata table (position mapping CSV)
///
/// One row per candidate insertion region, with a header naming at least:
/// sample, region_id, category, orig_chrom, orig_start, orig_end, orig_length,
/// extr_chrom, extr_start, extr_end, extr_length, left_flank, right_flank,
/// total_flank. Extra columns are ignored; column order is free.
use crate::error::Error;
use log::{debug, warn};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Columns that must be present in the metadata header.
pub const REQUIRED_COLUMNS: [&str; 14] = [
    "sample",
    "region_id",
    "category",
    "orig_chrom",
    "orig_start",
    "orig_end",
    "orig_length",
    "extr_chrom",
    "extr_start",
    "extr_end",
    "extr_length",
    "left_flank",
    "right_flank",
    "total_flank",
];

/// Descriptor of one candidate region and its extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionMeta {
    pub sample: String,
    pub region_id: String,
    pub category: String,
    pub orig_chrom: String,
    pub orig_start: i64,
    pub orig_end: i64,
    pub orig_length: i64,
    pub extr_chrom: String,
    pub extr_start: i64,
    pub extr_end: i64,
    pub extr_length: i64,
    pub left_flank: i64,
    pub right_flank: i64,
    pub total_flank: i64,
}

impl RegionMeta {
    /// Inserted sequence length implied by the flank sizes (never negative).
    pub fn insert_length(&self) -> i64 {
        self.extr_length
            .saturating_sub(self.left_flank)
            .saturating_sub(self.right_flank)
            .max(0)
    }
}

/// Regions of one sample in table order, indexed by region_id.
#[derive(Debug, Default)]
struct SampleRegions {
    regions: Vec<RegionMeta>,
    by_id: HashMap<String, usize>,
}

/// Immutable index of region metadata keyed by (sample, region_id).
#[derive(Debug, Default)]
pub struct RegionIndex {
    samples: HashMap<String, SampleRegions>,
    n_regions: usize,
}

impl RegionIndex {
    /// Load the metadata table from a CSV file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let file = File::open(path).map_err(|e| Error::io(e, path))?;
        Self::from_reader(BufReader::new(file), path)
    }

    /// Load from any buffered source; `path` is only used in error messages.
    pub fn from_reader<R: BufRead>(reader: R, path: &Path) -> Result<Self, Error> {
        let mut lines = reader.lines().enumerate();

        // Header is the first non-blank line
        let (header_line, header) = loop {
            match lines.next() {
                Some((i, line)) => {
                    let line = line.map_err(|e| Error::io(e, path))?;
                    if !line.trim().is_empty() {
                        break (i + 1, line);
                    }
                }
                None => {
                    return Err(Error::Schema(format!(
                        "empty metadata table {}",
                        path.display()
                    )))
                }
            }
        };

        let columns = ColumnMap::from_header(&header, path)?;
        debug!(
            "metadata header at line {} of {} ({} columns)",
            header_line,
            path.display(),
            columns.width
        );

        let mut index = Self::default();
        for (i, line) in lines {
            let line_num = i + 1;
            let line = line.map_err(|e| Error::io(e, path))?;
            if line.trim().is_empty() {
                continue;
            }
            let meta = columns.parse_row(&line, path, line_num)?;
            index.insert(meta);
        }

        Ok(index)
    }

    /// Insert a region; a later row for the same key replaces the earlier one
    /// but keeps its position.
    fn insert(&mut self, meta: RegionMeta) {
        let sample = self.samples.entry(meta.sample.clone()).or_default();
        match sample.by_id.get(&meta.region_id) {
            Some(&pos) => {
                warn!(
                    "duplicate metadata row for sample {} region {}; keeping the last one",
                    meta.sample,
                    meta.region_id
                );
                sample.regions[pos] = meta;
            }
            None => {
                sample
                    .by_id
                    .insert(meta.region_id.clone(), sample.regions.len());
                sample.regions.push(meta);
                self.n_regions += 1;
            }
        }
    }

    /// All regions of a sample in table order (empty for unknown samples).
    pub fn regions_for(&self, sample: &str) -> &[RegionMeta] {
        self.samples
            .get(sample)
            .map(|s| s.regions.as_slice())
            .unwrap_or(&[])
    }

    /// Look up one region of a sample.
    pub fn get(&self, sample: &str, region_id: &str) -> Option<&RegionMeta> {
        let s = self.samples.get(sample)?;
        s.by_id.get(region_id).map(|&pos| &s.regions[pos])
    }

    /// Number of distinct (sample, region_id) entries.
    pub fn len(&self) -> usize {
        self.n_regions
    }

    pub fn is_empty(&self) -> bool {
        self.n_regions == 0
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }
}

/// Positions of the required columns within a row.
struct ColumnMap {
    positions: HashMap<&'static str, usize>,
    width: usize,
}

impl ColumnMap {
    fn from_header(header: &str, path: &Path) -> Result<Self, Error> {
        let names = split_record(header);

        let mut positions = HashMap::new();
        let mut missing = Vec::new();
        for col in REQUIRED_COLUMNS {
            match names.iter().position(|n| *n == col) {
                Some(pos) => {
                    positions.insert(col, pos);
                }
                None => missing.push(col),
            }
        }

        if !missing.is_empty() {
            missing.sort_unstable();
            return Err(Error::Schema(format!(
                "missing columns in {}: {:?}",
                path.display(),
                missing
            )));
        }

        Ok(Self {
            positions,
            width: names.len(),
        })
    }

    fn parse_row(&self, line: &str, path: &Path, line_num: usize) -> Result<RegionMeta, Error> {
        let fields = split_record(line);
        if fields.len() < self.width {
            return Err(Error::Schema(format!(
                "{} line {} has {} fields, header has {}",
                path.display(),
                line_num,
                fields.len(),
                self.width
            )));
        }

        let text = |col: &'static str| fields[self.positions[col]].clone();
        let int = |col: &'static str| -> Result<i64, Error> {
            let raw = fields[self.positions[col]].as_str();
            raw.parse::<i64>().map_err(|e| {
                Error::format(path, line_num, format!("invalid {col} '{raw}': {e}"))
            })
        };

        Ok(RegionMeta {
            sample: text("sample"),
            region_id: text("region_id"),
            category: text("category"),
            orig_chrom: text("orig_chrom"),
            orig_start: int("orig_start")?,
            orig_end: int("orig_end")?,
            orig_length: int("orig_length")?,
            extr_chrom: text("extr_chrom"),
            extr_start: int("extr_start")?,
            extr_end: int("extr_end")?,
            extr_length: int("extr_length")?,
            left_flank: int("left_flank")?,
            right_flank: int("right_flank")?,
            total_flank: int("total_flank")?,
        })
    }
}

/// Split one CSV record into trimmed fields.
///
/// Double-quoted fields may contain commas; `""` inside quotes is a literal quote.
fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted => {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    quoted = false;
                }
            }
            '"' if field.trim().is_empty() => {
                field.clear();
                quoted = true;
            }
            ',' if !quoted => {
                fields.push(field.trim().to_string());
                field.clear();
            }
            _ => field.push(c),
        }
    }
    fields.push(field.trim().to_string());
    fields
}
