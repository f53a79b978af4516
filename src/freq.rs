use indexmap::map::IndexMap;
use log::warn;
use std::io;
use std::io::{BufReader, Read};
use thiserror::Error;

use super::file::{FileError, InputFile};

/// The float type for allele frequencies.
pub type Freq = f64;

/// The integer type for chromosome names.
///
/// Reference panels distributed for association work use numeric
/// chromosome codes; non-numeric names fail as parse errors.
pub type Chrom = u32;

/// The integer type for genomic positions.
pub type Position = u64;

/// Leading columns of a combined frequency file header before the
/// per-population frequency labels begin.
const FIXED_HEADER_COLUMNS: usize = 6;

/// How many leading characters of a results identifier are stripped
/// before comparison against the reference identifier.
const ID_PREFIX_LEN: usize = 3;

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("IO error: {0}")]
    IOError(#[from] io::Error),
    #[error("File reading error: {0}")]
    FileError(#[from] FileError),
    #[error("no header available from file \"{0}\"")]
    MissingHeader(String),
    #[error("cannot parse header intro info from file \"{0}\"")]
    HeaderParse(String),
    #[error("unable to locate header \"{label}\" in frequency file \"{filename}\" (available: {available})")]
    UnknownPopulation {
        label: String,
        filename: String,
        available: String,
    },
    #[error("required option \"{0}\" missing")]
    MissingOption(&'static str),
    #[error("cannot parse frequency file \"{filename}\" line \"{line}\"")]
    FreqParse { filename: String, line: String },
    #[error("cannot parse file \"{filename}\" line \"{line}\"")]
    InputParse { filename: String, line: String },
}

/// Format a frequency for output: six digit precision with trailing
/// zeros (and a trailing dot) removed.
pub fn format_freq(freq: Freq) -> String {
    let mut out = format!("{:.6}", freq);
    while out.ends_with('0') {
        out.pop();
    }
    if out.ends_with('.') {
        out.pop();
    }
    out
}

/// Parse the per-population frequency column labels from a combined
/// frequency file header line.
///
/// The first [`FIXED_HEADER_COLUMNS`] tokens describe the variant
/// annotation columns and are skipped; each remaining token is a
/// population label, mapped to its 1-based offset among the frequency
/// columns. Returns `None` if the header has too few leading tokens.
/// The first occurrence of a repeated label wins.
pub fn population_columns(header: &str) -> Option<IndexMap<String, usize>> {
    let mut fields = header.split_whitespace();
    for _ in 0..FIXED_HEADER_COLUMNS {
        fields.next()?;
    }
    let mut columns = IndexMap::new();
    for (offset, label) in fields.enumerate() {
        columns.entry(label.to_string()).or_insert(offset + 1);
    }
    Some(columns)
}

/// A single reference variant as most recently matched by the cursor.
///
/// Invariant: `alt_alleles` and `freqs` are parallel and equal length.
#[derive(Debug, Default, Clone)]
pub struct VariantRecord {
    /// The reference catalog identifier, as it appears in the file.
    pub id: String,
    pub chrom: Chrom,
    pub pos: Position,
    pub ref_allele: String,
    /// Alternate alleles. Reference files carry one alternate per line;
    /// multiallelic sites appear as consecutive single-alternate lines.
    pub alt_alleles: Vec<String>,
    /// Frequencies of the alternate alleles, each in [0, 1].
    pub freqs: Vec<Freq>,
}

type LineStream = io::Lines<BufReader<Box<dyn Read>>>;

/// The two layouts a reference frequency source can take, fixed at
/// construction time.
enum FreqStreams {
    /// One combined file: variant columns followed by one frequency
    /// column per population; `freq_offset` is the 1-based offset of
    /// the target population among the frequency columns.
    Combined {
        lines: LineStream,
        freq_offset: usize,
    },
    /// Two parallel files: variant metadata lines, and one bare
    /// frequency value per line, index-aligned with the metadata.
    Split {
        metadata: LineStream,
        values: LineStream,
    },
}

/// A forward-only cursor over a sorted reference frequency source.
///
/// The source and the queried results file must both be sorted by
/// (chromosome, position); the cursor only ever advances, so a variant
/// consumed while scanning for an earlier query can never be matched by
/// a later one.
///
/// A combined frequency file looks like:
///
/// ```text
/// CHR BP SNP A1 A2 INFO EUR AFR EAS SAS AMR
/// 1:55550:A:G 1 55550 A G . 0.102 0.201 0.305 0.221 0.150
/// 1:82571:T:C 1 82571 T C . 0.870 0.640 0.910 0.881 0.795
/// ```
///
/// where the header names one population per frequency column. A split
/// source carries the first five columns in a metadata file and a
/// single frequency value per line in the main file.
pub struct FreqSource {
    filename: String,
    streams: FreqStreams,
    next_chrom: Chrom,
    next_pos: Position,
    record: VariantRecord,
}

impl FreqSource {
    /// Open a reference frequency source.
    ///
    /// With no metadata file, `filename` is read as a combined
    /// multi-population file: its header line is consumed and
    /// `population` is resolved case-insensitively against the header's
    /// frequency column labels. With a metadata file, `filename` is
    /// read as per-line frequency values parallel to the metadata
    /// lines, one header line of the metadata is discarded, and
    /// `population` is unused.
    pub fn open(
        filename: &str,
        metadata_filename: Option<&str>,
        population: &str,
    ) -> Result<FreqSource, AnnotateError> {
        let mut lines = InputFile::new(filename).lines()?;
        let streams = match metadata_filename {
            None => {
                let header = lines
                    .next()
                    .transpose()?
                    .ok_or_else(|| AnnotateError::MissingHeader(filename.to_string()))?;
                let columns = population_columns(&header)
                    .ok_or_else(|| AnnotateError::HeaderParse(filename.to_string()))?;
                let freq_offset = columns
                    .iter()
                    .find(|(label, _)| label.eq_ignore_ascii_case(population))
                    .map(|(_, offset)| *offset)
                    .ok_or_else(|| AnnotateError::UnknownPopulation {
                        label: population.to_string(),
                        filename: filename.to_string(),
                        available: columns.keys().cloned().collect::<Vec<_>>().join(", "),
                    })?;
                FreqStreams::Combined { lines, freq_offset }
            }
            Some(metadata_filename) => {
                let mut metadata = InputFile::new(metadata_filename).lines()?;
                // discard the metadata header; format compatibility is
                // by convention, not validated
                let _ = metadata.next().transpose()?;
                FreqStreams::Split {
                    metadata,
                    values: lines,
                }
            }
        };
        Ok(FreqSource {
            filename: filename.to_string(),
            streams,
            next_chrom: 0,
            next_pos: 0,
            record: VariantRecord::default(),
        })
    }

    /// The variant most recently matched by [`FreqSource::align`].
    pub fn record(&self) -> &VariantRecord {
        &self.record
    }

    fn next_variant_line(&mut self) -> Result<Option<String>, AnnotateError> {
        let lines = match &mut self.streams {
            FreqStreams::Combined { lines, .. } => lines,
            FreqStreams::Split { metadata, .. } => metadata,
        };
        Ok(lines.next().transpose()?)
    }

    fn parse_error(&self, line: &str) -> AnnotateError {
        AnnotateError::FreqParse {
            filename: self.filename.clone(),
            line: line.to_string(),
        }
    }

    /// Advance the cursor to the variant with the given coordinate and
    /// identifier.
    ///
    /// The identifier is compared after stripping the caller's leading
    /// [`ID_PREFIX_LEN`] characters, case-insensitively. Returns `true`
    /// and populates [`FreqSource::record`] on a match; returns `false`
    /// once the source has moved past the coordinate or is exhausted.
    ///
    /// When a multiallelic site is split across lines and sorted
    /// differently from the results file, the scan can pass the
    /// coordinate without seeing the requested alternate; that case is
    /// reported as a warning and treated as no match.
    pub fn align(&mut self, chrom: Chrom, pos: Position, id: &str) -> Result<bool, AnnotateError> {
        let target_id = id.get(ID_PREFIX_LEN..).unwrap_or("");
        let mut dup_position = false;
        while self.next_chrom < chrom || (self.next_chrom == chrom && self.next_pos <= pos) {
            let line = match self.next_variant_line()? {
                Some(line) => line,
                None => break,
            };
            let mut fields = line.split_whitespace();
            let line_id = fields.next();
            let next_chrom = fields.next().and_then(|t| t.parse::<Chrom>().ok());
            let next_pos = fields.next().and_then(|t| t.parse::<Position>().ok());
            let ref_allele = fields.next();
            let alt_allele = fields.next();
            let (Some(line_id), Some(next_chrom), Some(next_pos), Some(ref_allele), Some(alt_allele)) =
                (line_id, next_chrom, next_pos, ref_allele, alt_allele)
            else {
                return Err(self.parse_error(&line));
            };
            self.next_chrom = next_chrom;
            self.next_pos = next_pos;
            if line_id.eq_ignore_ascii_case(target_id) {
                self.record.id = line_id.to_string();
                self.record.chrom = next_chrom;
                self.record.pos = next_pos;
                self.record.ref_allele = ref_allele.to_string();
                self.record.alt_alleles = vec![alt_allele.to_string()];
                let freq = match &mut self.streams {
                    FreqStreams::Split { values, .. } => match values.next().transpose()? {
                        Some(value_line) => {
                            let parsed = value_line.trim().parse::<Freq>();
                            match parsed {
                                Ok(freq) => freq,
                                Err(_) => {
                                    return Err(AnnotateError::FreqParse {
                                        filename: self.filename.clone(),
                                        line: value_line,
                                    })
                                }
                            }
                        }
                        None => break,
                    },
                    FreqStreams::Combined { freq_offset, .. } => {
                        // the sixth column is a variant annotation the
                        // lookup does not use
                        let _ = fields.next();
                        let mut value = 0.0;
                        for _ in 0..*freq_offset {
                            value = match fields.next().and_then(|t| t.parse::<Freq>().ok()) {
                                Some(value) => value,
                                None => {
                                    return Err(AnnotateError::FreqParse {
                                        filename: self.filename.clone(),
                                        line: line.clone(),
                                    })
                                }
                            };
                        }
                        value
                    }
                };
                self.record.freqs = vec![freq];
                return Ok(true);
            } else if let FreqStreams::Split { values, .. } = &mut self.streams {
                // keep the values stream in lockstep with the metadata
                let _ = values.next().transpose()?;
            }
            if next_chrom == chrom && next_pos == pos {
                dup_position = true;
            }
        }
        if dup_position {
            warn!(
                "possible multiallelic sorting issue for chr {} pos {}",
                chrom, pos
            );
        }
        Ok(false)
    }

    /// Look up the frequency of the allele pair `(a1, a2)` at a
    /// coordinate, reporting the frequency of `a2`.
    ///
    /// One of the two alleles must equal the reference allele of the
    /// matched variant and the other one of its alternates, compared
    /// case-insensitively. When the alternate is `a1` rather than `a2`,
    /// the stored frequency is flipped to `1 - f` so the returned value
    /// always describes `a2`. `None` is an ordinary outcome meaning no
    /// safe correspondence exists, never an error.
    pub fn find(
        &mut self,
        chrom: Chrom,
        pos: Position,
        id: &str,
        a1: &str,
        a2: &str,
    ) -> Result<Option<Freq>, AnnotateError> {
        if !self.align(chrom, pos, id)? {
            return Ok(None);
        }
        let alt_target = if a1.eq_ignore_ascii_case(&self.record.ref_allele) {
            a2
        } else if a2.eq_ignore_ascii_case(&self.record.ref_allele) {
            a1
        } else {
            return Ok(None);
        };
        for (alt, freq) in self.record.alt_alleles.iter().zip(&self.record.freqs) {
            if alt_target.eq_ignore_ascii_case(alt) {
                let freq = if alt_target == a2 { *freq } else { 1.0 - *freq };
                return Ok(Some(freq));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const COMBINED: &str = "\
CHR BP SNP A1 A2 INFO EUR AFR EAS
1:900:T:C 1 900 T C . 0.50 0.40 0.30
1:1000:A:G 1 1000 A G . 0.10 0.20 0.30
1:1500:A:G 1 1500 A G . 0.15 0.25 0.35
1:1500:A:C 1 1500 A C . 0.05 0.06 0.07
1:2000:C:T 1 2000 C T . 0.25 0.35 0.45
2:500:G:A 2 500 G A . 0.60 0.70 0.80
";

    const SPLIT_METADATA: &str = "\
SNP CHR BP A1 A2
1:900:T:C 1 900 T C
1:1000:A:G 1 1000 A G
1:2000:C:T 1 2000 C T
";

    const SPLIT_VALUES: &str = "0.50\n0.10\n0.25\n";

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> String {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path.to_str().unwrap().to_string()
    }

    fn combined_source(dir: &TempDir, population: &str) -> FreqSource {
        let path = write_file(dir, "freqs.txt", COMBINED);
        FreqSource::open(&path, None, population).unwrap()
    }

    #[test]
    fn test_population_columns() {
        let columns = population_columns("CHR BP SNP A1 A2 INFO EUR AFR EAS").unwrap();
        assert_eq!(columns.get("EUR"), Some(&1));
        assert_eq!(columns.get("AFR"), Some(&2));
        assert_eq!(columns.get("EAS"), Some(&3));
        assert!(population_columns("CHR BP SNP").is_none());
    }

    #[test]
    fn test_format_freq() {
        assert_eq!(format_freq(0.9), "0.9");
        assert_eq!(format_freq(0.25), "0.25");
        assert_eq!(format_freq(0.0), "0");
        assert_eq!(format_freq(1.0), "1");
        assert_eq!(format_freq(0.123456789), "0.123457");
    }

    #[test]
    fn test_combined_find_reports_second_allele() {
        let dir = TempDir::new().unwrap();
        let mut source = combined_source(&dir, "EUR");
        let freq = source.find(1, 1000, "chr1:1000:A:G", "A", "G").unwrap();
        assert_eq!(freq, Some(0.10));
    }

    #[test]
    fn test_combined_find_flips_first_allele() {
        let dir = TempDir::new().unwrap();
        let mut source = combined_source(&dir, "EUR");
        let freq = source
            .find(1, 1000, "chr1:1000:A:G", "G", "A")
            .unwrap()
            .unwrap();
        assert!((freq - 0.90).abs() < 1e-10);
    }

    #[test]
    fn test_flip_complement_sums_to_one() {
        let dir = TempDir::new().unwrap();
        let mut direct = combined_source(&dir, "AFR");
        let mut flipped = combined_source(&dir, "AFR");
        let f1 = direct
            .find(1, 1000, "chr1:1000:A:G", "A", "G")
            .unwrap()
            .unwrap();
        let f2 = flipped
            .find(1, 1000, "chr1:1000:A:G", "G", "A")
            .unwrap()
            .unwrap();
        assert!((f1 + f2 - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_target_column_selection() {
        let dir = TempDir::new().unwrap();
        let mut source = combined_source(&dir, "EAS");
        let freq = source.find(1, 1000, "chr1:1000:A:G", "A", "G").unwrap();
        assert_eq!(freq, Some(0.30));
    }

    #[test]
    fn test_population_label_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let mut source = combined_source(&dir, "afr");
        let freq = source.find(1, 1000, "chr1:1000:A:G", "A", "G").unwrap();
        assert_eq!(freq, Some(0.20));
    }

    #[test]
    fn test_unknown_population() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "freqs.txt", COMBINED);
        let result = FreqSource::open(&path, None, "AMR");
        assert!(matches!(
            result,
            Err(AnnotateError::UnknownPopulation { .. })
        ));
    }

    #[test]
    fn test_empty_frequency_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "freqs.txt", "");
        let result = FreqSource::open(&path, None, "EUR");
        assert!(matches!(result, Err(AnnotateError::MissingHeader(_))));
    }

    #[test]
    fn test_identifier_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let mut source = combined_source(&dir, "EUR");
        let freq = source.find(1, 1000, "CHR1:1000:a:g", "A", "G").unwrap();
        assert_eq!(freq, Some(0.10));
    }

    #[test]
    fn test_allele_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let mut source = combined_source(&dir, "EUR");
        let freq = source.find(1, 1000, "chr1:1000:A:G", "a", "g").unwrap();
        assert_eq!(freq, Some(0.10));
    }

    #[test]
    fn test_neither_allele_matches_reference() {
        let dir = TempDir::new().unwrap();
        let mut source = combined_source(&dir, "EUR");
        let freq = source.find(1, 1000, "chr1:1000:A:G", "T", "C").unwrap();
        assert_eq!(freq, None);
    }

    #[test]
    fn test_cursor_never_rewinds() {
        let dir = TempDir::new().unwrap();
        let mut source = combined_source(&dir, "EUR");
        let later = source.find(1, 2000, "chr1:2000:C:T", "C", "T").unwrap();
        assert_eq!(later, Some(0.25));
        let earlier = source.find(1, 1000, "chr1:1000:A:G", "A", "G").unwrap();
        assert_eq!(earlier, None);
    }

    #[test]
    fn test_multiallelic_second_line_reachable() {
        let dir = TempDir::new().unwrap();
        let mut source = combined_source(&dir, "EUR");
        let freq = source.find(1, 1500, "chr1:1500:A:C", "A", "C").unwrap();
        assert_eq!(freq, Some(0.05));
    }

    #[test]
    fn test_absent_identifier_at_coordinate() {
        let dir = TempDir::new().unwrap();
        let mut source = combined_source(&dir, "EUR");
        // scans past pos 1000 without a matching id; warns and misses
        let freq = source.find(1, 1000, "chr1:1000:T:C", "T", "C").unwrap();
        assert_eq!(freq, None);
    }

    #[test]
    fn test_align_populates_record() {
        let dir = TempDir::new().unwrap();
        let mut source = combined_source(&dir, "EUR");
        assert!(source.align(1, 1000, "chr1:1000:A:G").unwrap());
        let record = source.record();
        assert_eq!(record.id, "1:1000:A:G");
        assert_eq!(record.chrom, 1);
        assert_eq!(record.pos, 1000);
        assert_eq!(record.ref_allele, "A");
        assert_eq!(record.alt_alleles, vec!["G".to_string()]);
        assert_eq!(record.freqs, vec![0.10]);
    }

    #[test]
    fn test_malformed_reference_line() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "freqs.txt",
            "CHR BP SNP A1 A2 INFO EUR\n1:1000:A:G 1 1000 A\n",
        );
        let mut source = FreqSource::open(&path, None, "EUR").unwrap();
        let result = source.find(1, 1000, "chr1:1000:A:G", "A", "G");
        assert!(matches!(result, Err(AnnotateError::FreqParse { .. })));
    }

    #[test]
    fn test_target_column_past_line_end() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "freqs.txt",
            "CHR BP SNP A1 A2 INFO EUR AFR EAS\n1:1000:A:G 1 1000 A G . 0.10 0.20\n",
        );
        let mut source = FreqSource::open(&path, None, "EAS").unwrap();
        let result = source.find(1, 1000, "chr1:1000:A:G", "A", "G");
        assert!(matches!(result, Err(AnnotateError::FreqParse { .. })));
    }

    #[test]
    fn test_split_streams_stay_in_lockstep() {
        let dir = TempDir::new().unwrap();
        let values = write_file(&dir, "values.txt", SPLIT_VALUES);
        let metadata = write_file(&dir, "metadata.txt", SPLIT_METADATA);
        let mut source = FreqSource::open(&values, Some(&metadata), "").unwrap();
        // two non-matching metadata lines must each consume one value
        let freq = source.find(1, 2000, "chr1:2000:C:T", "C", "T").unwrap();
        assert_eq!(freq, Some(0.25));
    }

    #[test]
    fn test_split_values_exhausted() {
        let dir = TempDir::new().unwrap();
        let values = write_file(&dir, "values.txt", "0.50\n");
        let metadata = write_file(&dir, "metadata.txt", SPLIT_METADATA);
        let mut source = FreqSource::open(&values, Some(&metadata), "").unwrap();
        let freq = source.find(1, 1000, "chr1:1000:A:G", "A", "G").unwrap();
        assert_eq!(freq, None);
    }

    #[test]
    fn test_split_malformed_value_line() {
        let dir = TempDir::new().unwrap();
        let values = write_file(&dir, "values.txt", "0.50\nnot-a-number\n0.25\n");
        let metadata = write_file(&dir, "metadata.txt", SPLIT_METADATA);
        let mut source = FreqSource::open(&values, Some(&metadata), "").unwrap();
        let result = source.find(1, 1000, "chr1:1000:A:G", "A", "G");
        assert!(matches!(result, Err(AnnotateError::FreqParse { .. })));
    }

    #[test]
    fn test_short_identifier_never_matches() {
        let dir = TempDir::new().unwrap();
        let mut source = combined_source(&dir, "EUR");
        let freq = source.find(1, 1000, "id", "A", "G").unwrap();
        assert_eq!(freq, None);
    }
}
