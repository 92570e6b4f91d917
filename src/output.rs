/// Tab-separated and JSON report writers
///
/// region_validation.tsv: one row per region (see [`REGION_HEADER`])
/// read_details.tsv: one row per deduplicated (read, region) pair (see [`READ_DETAIL_HEADER`])
/// qc.json: one [`QcSummary`] object
use crate::classify::RegionVerdict;
use crate::error::Error;
use crate::evidence::Evidence;
use crate::paf::AlignmentRecord;
use crate::qc::QcSummary;
use crate::region::RegionMeta;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const REGION_TABLE_NAME: &str = "region_validation.tsv";
pub const READ_DETAILS_NAME: &str = "read_details.tsv";
pub const QC_NAME: &str = "qc.json";
pub const COMBINED_REGION_TABLE_NAME: &str = "all_samples_region_validation.tsv";
pub const COMBINED_QC_NAME: &str = "qc_all_samples.json";

pub const REGION_HEADER: [&str; 22] = [
    "sample",
    "type",
    "region_id",
    "validated_level",
    "extr_chrom",
    "extr_start",
    "extr_end",
    "extr_length",
    "left_flank",
    "right_flank",
    "insert_length",
    "tlen",
    "n_full_span_reads",
    "n_single_junction_reads",
    "max_target_cov",
    "max_insert_overlap",
    "n_read_region_pairs",
    "orig_chrom",
    "orig_start",
    "orig_end",
    "orig_length",
    "category",
];

pub const READ_DETAIL_HEADER: [&str; 13] = [
    "sample",
    "type",
    "region_id",
    "qname",
    "tlen",
    "tstart",
    "tend",
    "target_cov",
    "insert_overlap",
    "full_span_evidence",
    "single_junction_evidence",
    "mapq",
    "tp",
];

/// Render one region_validation.tsv row (no trailing newline).
pub fn format_region_row(sample: &str, insert_type: &str, meta: &RegionMeta, verdict: &RegionVerdict) -> String {
    let tlen = verdict
        .target_length
        .map(|t| t.to_string())
        .unwrap_or_default();

    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.6}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        sample,
        insert_type,
        meta.region_id,
        verdict.level,
        meta.extr_chrom,
        meta.extr_start,
        meta.extr_end,
        meta.extr_length,
        meta.left_flank,
        meta.right_flank,
        meta.insert_length(),
        tlen,
        verdict.n_full_span_reads,
        verdict.n_single_junction_reads,
        verdict.max_target_cov,
        verdict.max_insert_overlap,
        verdict.n_pairs,
        meta.orig_chrom,
        meta.orig_start,
        meta.orig_end,
        meta.orig_length,
        meta.category,
    )
}

/// Render one read_details.tsv row (no trailing newline).
pub fn format_read_detail_row(
    sample: &str,
    insert_type: &str,
    region_id: &str,
    aln: &AlignmentRecord,
    evidence: &Evidence,
) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.6}\t{}\t{}\t{}\t{}\t{}",
        sample,
        insert_type,
        region_id,
        aln.query_name,
        aln.target_length,
        aln.target_start,
        aln.target_end,
        evidence.target_cov,
        evidence.insert_overlap,
        u8::from(evidence.full_span),
        u8::from(evidence.single_junction),
        aln.mapq,
        aln.alignment_type
            .as_ref()
            .map(|t| t.as_str())
            .unwrap_or(""),
    )
}

/// Write `contents` to a sibling temp file, then rename it into place.
fn write_replace(path: &Path, write: impl FnOnce(&mut BufWriter<File>) -> std::io::Result<()>) -> Result<(), Error> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let file = File::create(&tmp).map_err(|e| Error::io(e, &tmp))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer).map_err(|e| Error::io(e, &tmp))?;
    writer.flush().map_err(|e| Error::io(e, &tmp))?;
    drop(writer);

    fs::rename(&tmp, path).map_err(|e| Error::io(e, path))
}

/// Write a header line followed by pre-rendered rows.
pub fn write_tsv<S: AsRef<str>>(path: &Path, header: &[&str], rows: &[S]) -> Result<(), Error> {
    write_replace(path, |w| {
        writeln!(w, "{}", header.join("\t"))?;
        for row in rows {
            writeln!(w, "{}", row.as_ref())?;
        }
        Ok(())
    })
}

pub fn write_qc(path: &Path, qc: &QcSummary) -> Result<(), Error> {
    let json = qc.to_json()?;
    write_replace(path, |w| w.write_all(json.as_bytes()))
}

/// Write a list of QC objects as one pretty JSON array.
pub fn write_qc_list<T: serde::Serialize>(path: &Path, items: &[T]) -> Result<(), Error> {
    let json = serde_json::to_string_pretty(items)?;
    write_replace(path, |w| w.write_all(json.as_bytes()))
}

/// Create a directory (and parents) if missing.
pub fn ensure_dir(path: &Path) -> Result<(), Error> {
    fs::create_dir_all(path).map_err(|e| Error::io(e, path))
}
