/// PAF alignment reader
///
/// PAF columns (see https://github.com/lh3/miniasm/blob/master/PAF.md):
/// 1. query name
/// 2. query length
/// 3. query start (0-based)
/// 4. query end
/// 5. relative strand (+ or -)
/// 6. target name (`<region_id>::<anything>`)
/// 7. target length
/// 8. target start
/// 9. target end
/// 10. no. of matches
/// 11. alignment block length
/// 12. mapping quality
///
/// followed by optional `TAG:TYPE:VALUE` fields.
use crate::error::Error;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Number of mandatory PAF columns.
pub const PAF_MANDATORY_FIELDS: usize = 12;

/// Delimiter separating the region id from the rest of a target name.
pub const REGION_ID_DELIMITER: &str = "::";

/// Alignment type from the `tp:A:` tag.
///
/// Tag values are case-sensitive: `I` and `i` are different types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlignmentType {
    /// `P`
    Primary,
    /// `S`
    Secondary,
    /// `I`, primary inversion
    Inversion,
    /// `i`, secondary inversion
    SecondaryInversion,
    Other(String),
}

impl AlignmentType {
    pub fn from_tag_value(value: &str) -> Self {
        match value {
            "P" => Self::Primary,
            "S" => Self::Secondary,
            "I" => Self::Inversion,
            "i" => Self::SecondaryInversion,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Primary => "P",
            Self::Secondary => "S",
            Self::Inversion => "I",
            Self::SecondaryInversion => "i",
            Self::Other(s) => s,
        }
    }
}

impl std::fmt::Display for AlignmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed view over the optional `TAG:TYPE:VALUE` tail of a PAF line.
#[derive(Debug, Clone, Copy)]
pub struct OptionalFields<'a> {
    fields: &'a [&'a str],
}

impl<'a> OptionalFields<'a> {
    pub fn new(fields: &'a [&'a str]) -> Self {
        Self { fields }
    }

    /// Value of the first field matching `tag` and `ty`, if any.
    ///
    /// Empty values do not count as a match.
    pub fn get(&self, tag: &str, ty: char) -> Option<&'a str> {
        self.fields.iter().find_map(|field| {
            let mut parts = field.splitn(3, ':');
            let (t, k, v) = (parts.next()?, parts.next()?, parts.next()?);
            let mut k_chars = k.chars();
            if t == tag && k_chars.next() == Some(ty) && k_chars.next().is_none() && !v.is_empty()
            {
                Some(v)
            } else {
                None
            }
        })
    }

    pub fn alignment_type(&self) -> Option<AlignmentType> {
        self.get("tp", 'A').map(AlignmentType::from_tag_value)
    }
}

/// One PAF line.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentRecord {
    pub query_name: String,
    pub query_length: i64,
    pub query_start: i64,
    pub query_end: i64,
    pub strand: char,
    pub target_name: String,
    pub target_length: i64,
    pub target_start: i64,
    pub target_end: i64,
    pub n_matches: i64,
    pub alignment_length: i64,
    pub mapq: u32,
    pub alignment_type: Option<AlignmentType>,
}

impl AlignmentRecord {
    /// Region id encoded in the target name.
    pub fn region_id(&self) -> &str {
        region_id_from_target(&self.target_name)
    }

    /// Number of target bases covered (`tend - tstart`).
    pub fn target_span(&self) -> i64 {
        self.target_end.saturating_sub(self.target_start)
    }
}

/// Substring of a target name before the first `::` (whole name if absent).
pub fn region_id_from_target(target_name: &str) -> &str {
    target_name
        .split_once(REGION_ID_DELIMITER)
        .map_or(target_name, |(id, _)| id)
}

/// Sample id of an alignment file: base name up to the first `_`.
pub fn sample_from_path(path: &Path) -> String {
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match base.split_once('_') {
        Some((sample, _)) => sample.to_string(),
        None => base,
    }
}

/// Outcome of decoding a single line.
#[derive(Debug, PartialEq)]
enum Line {
    Record(Box<AlignmentRecord>),
    /// Blank or `#` comment
    Skip,
    /// Fewer than 12 tab-separated fields
    Malformed,
}

/// Decode one PAF line. Numeric fields that fail to parse or are negative
/// are an error.
fn parse_line(line: &str, path: &Path, line_num: usize) -> Result<Line, Error> {
    let line = line.trim_end_matches(['\n', '\r']);
    if line.is_empty() || line.starts_with('#') {
        return Ok(Line::Skip);
    }

    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < PAF_MANDATORY_FIELDS {
        return Ok(Line::Malformed);
    }

    let int = |idx: usize, name: &str| -> Result<i64, Error> {
        let value = fields[idx].parse::<i64>().map_err(|e| {
            Error::format(
                path,
                line_num,
                format!("invalid {} '{}': {}", name, fields[idx], e),
            )
        })?;
        if value < 0 {
            return Err(Error::format(
                path,
                line_num,
                format!("negative {} '{}'", name, fields[idx]),
            ));
        }
        Ok(value)
    };

    let mapq = fields[11].parse::<u32>().map_err(|e| {
        Error::format(
            path,
            line_num,
            format!("invalid mapping quality '{}': {}", fields[11], e),
        )
    })?;

    let tail = OptionalFields::new(&fields[PAF_MANDATORY_FIELDS..]);

    Ok(Line::Record(Box::new(AlignmentRecord {
        query_name: fields[0].to_string(),
        query_length: int(1, "query length")?,
        query_start: int(2, "query start")?,
        query_end: int(3, "query end")?,
        strand: fields[4].chars().next().unwrap_or('+'),
        target_name: fields[5].to_string(),
        target_length: int(6, "target length")?,
        target_start: int(7, "target start")?,
        target_end: int(8, "target end")?,
        n_matches: int(9, "number of matches")?,
        alignment_length: int(10, "alignment block length")?,
        mapq,
        alignment_type: tail.alignment_type(),
    })))
}

/// Lazy, single-pass reader over the records of one PAF file.
///
/// Blank lines and comments are skipped; lines with too few fields are
/// skipped and counted (see [`PafReader::malformed_lines`]).
pub struct PafReader {
    inner: Box<dyn BufRead + Send>,
    path: PathBuf,
    line_num: usize,
    malformed: u64,
    buf: String,
}

impl PafReader {
    /// Open a PAF file (plain, or gzip compressed if the name ends in `.gz`).
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = File::open(path).map_err(|e| Error::io(e, path))?;
        let is_gzipped = path.extension().is_some_and(|ext| ext == "gz");

        let inner: Box<dyn BufRead + Send> = if is_gzipped {
            Box::new(BufReader::new(GzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };

        Ok(Self::from_reader(inner, path))
    }

    /// Wrap an already-open source; `path` is used for error context only.
    pub fn from_reader(inner: Box<dyn BufRead + Send>, path: &Path) -> Self {
        Self {
            inner,
            path: path.to_path_buf(),
            line_num: 0,
            malformed: 0,
            buf: String::new(),
        }
    }

    /// Lines skipped so far for having fewer than 12 fields.
    pub fn malformed_lines(&self) -> u64 {
        self.malformed
    }
}

impl Iterator for PafReader {
    type Item = Result<AlignmentRecord, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.inner.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(Error::io(e, &self.path))),
            }
            self.line_num += 1;

            match parse_line(&self.buf, &self.path, self.line_num) {
                Ok(Line::Record(record)) => return Some(Ok(*record)),
                Ok(Line::Skip) => continue,
                Ok(Line::Malformed) => {
                    self.malformed += 1;
                    continue;
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const LINE: &str =
        "read1\t15000\t10\t14990\t+\tS1|r1::chr1:0-20000\t20000\t5\t19995\t14000\t15000\t60";

    fn parse(line: &str) -> Result<Line, Error> {
        parse_line(line, Path::new("test.paf"), 1)
    }

    #[test]
    fn test_parse_mandatory_fields() {
        let Line::Record(rec) = parse(LINE).unwrap() else {
            panic!("expected a record");
        };
        assert_eq!(rec.query_name, "read1");
        assert_eq!(rec.query_length, 15000);
        assert_eq!(rec.query_start, 10);
        assert_eq!(rec.query_end, 14990);
        assert_eq!(rec.strand, '+');
        assert_eq!(rec.target_name, "S1|r1::chr1:0-20000");
        assert_eq!(rec.region_id(), "S1|r1");
        assert_eq!(rec.target_length, 20000);
        assert_eq!(rec.target_start, 5);
        assert_eq!(rec.target_end, 19995);
        assert_eq!(rec.target_span(), 19990);
        assert_eq!(rec.n_matches, 14000);
        assert_eq!(rec.alignment_length, 15000);
        assert_eq!(rec.mapq, 60);
        assert_eq!(rec.alignment_type, None);
    }

    #[test]
    fn test_parse_tp_tag() {
        let line = format!("{LINE}\tNM:i:12\ttp:A:S\tcg:Z:100M\n");
        let Line::Record(rec) = parse(&line).unwrap() else {
            panic!("expected a record");
        };
        assert_eq!(rec.alignment_type, Some(AlignmentType::Secondary));
    }

    #[test]
    fn test_inversion_tags_are_case_sensitive() {
        let upper = AlignmentType::from_tag_value("I");
        let lower = AlignmentType::from_tag_value("i");
        assert_eq!(upper, AlignmentType::Inversion);
        assert_eq!(lower, AlignmentType::SecondaryInversion);
        assert_ne!(upper, lower);
        assert_eq!(lower.as_str(), "i");
        assert_eq!(upper.as_str(), "I");

        let line = format!("{LINE}\ttp:A:i");
        let Line::Record(rec) = parse(&line).unwrap() else {
            panic!("expected a record");
        };
        assert_eq!(rec.alignment_type.map(|t| t.to_string()), Some("i".to_string()));
    }

    #[test]
    fn test_tag_with_wrong_type_is_ignored() {
        let line = format!("{LINE}\ttp:Z:P\ttp:A:");
        let Line::Record(rec) = parse(&line).unwrap() else {
            panic!("expected a record");
        };
        assert_eq!(rec.alignment_type, None);
    }

    #[test]
    fn test_optional_fields_lookup() {
        let fields = ["NM:i:7", "tp:A:P", "cg:Z:5M1I4M", "garbage"];
        let tags = OptionalFields::new(&fields);
        assert_eq!(tags.get("NM", 'i'), Some("7"));
        assert_eq!(tags.get("cg", 'Z'), Some("5M1I4M"));
        assert_eq!(tags.alignment_type(), Some(AlignmentType::Primary));
        assert_eq!(tags.get("de", 'f'), None);
    }

    #[test]
    fn test_skip_and_malformed() {
        assert_eq!(parse("").unwrap(), Line::Skip);
        assert_eq!(parse("\n").unwrap(), Line::Skip);
        assert_eq!(parse("# comment\tline").unwrap(), Line::Skip);
        assert_eq!(parse("a\tb\tc").unwrap(), Line::Malformed);
    }

    #[test]
    fn test_non_numeric_is_format_error() {
        let line = LINE.replace("\t20000\t", "\tlong\t");
        let err = parse(&line).unwrap_err();
        assert!(matches!(err, Error::Format { line: 1, .. }));
        assert!(err.to_string().contains("target length"));

        let line = LINE.replace("\t60", "\tNA");
        assert!(parse(&line).is_err());
    }

    #[test]
    fn test_negative_coordinate_is_format_error() {
        let line = LINE.replace("\t20000\t5\t", "\t20000\t-50\t");
        let err = parse(&line).unwrap_err();
        assert!(matches!(err, Error::Format { line: 1, .. }));
        assert!(err.to_string().contains("negative target start '-50'"));

        let line = LINE.replace("\t15000\t10\t", "\t-15000\t10\t");
        assert!(parse(&line).unwrap_err().to_string().contains("query length"));

        let line = LINE.replace("\t60", "\t-1");
        assert!(parse(&line).is_err());
    }

    #[test]
    fn test_region_id_from_target() {
        assert_eq!(region_id_from_target("S1|r1::chr1:0-100"), "S1|r1");
        assert_eq!(region_id_from_target("a::b::c"), "a");
        assert_eq!(region_id_from_target("plain"), "plain");
    }

    #[test]
    fn test_sample_from_path() {
        assert_eq!(sample_from_path(Path::new("/x/HG002_numt_mapped.paf")), "HG002");
        assert_eq!(sample_from_path(Path::new("nounderscore.paf")), "nounderscore.paf");
    }

    #[test]
    fn test_reader_streams_records() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# header comment").unwrap();
        writeln!(file, "{LINE}\ttp:A:P").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "truncated\tline").unwrap();
        writeln!(file, "{}", LINE.replace("read1", "read2")).unwrap();
        file.flush().unwrap();

        let mut reader = PafReader::open(file.path()).unwrap();
        let first = reader.next().unwrap().unwrap();
        assert_eq!(first.query_name, "read1");
        assert_eq!(first.alignment_type, Some(AlignmentType::Primary));
        let second = reader.next().unwrap().unwrap();
        assert_eq!(second.query_name, "read2");
        assert!(reader.next().is_none());
        assert_eq!(reader.malformed_lines(), 1);
    }

    #[test]
    fn test_reader_reports_line_number() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{LINE}").unwrap();
        writeln!(file, "{}", LINE.replace("\t10\t", "\tx\t")).unwrap();
        file.flush().unwrap();

        let results: Vec<_> = PafReader::open(file.path()).unwrap().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::Format { line: 2, .. })));
    }

    #[test]
    fn test_reader_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("S1_numt_mapped.paf.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        writeln!(encoder, "{LINE}").unwrap();
        encoder.finish().unwrap();

        let records: Vec<_> = PafReader::open(&path)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target_length, 20000);
    }

    #[test]
    fn test_open_missing_file() {
        let err = PafReader::open(Path::new("/nonexistent/S1_numt_mapped.paf")).err().unwrap();
        assert!(matches!(err, Error::Io { .. }));
    }
}
