use log::info;
use std::io::Write;

use super::file::{InputFile, OutputFile};
use super::freq::{format_freq, AnnotateError, Chrom, FreqSource, Position};

/// How many results rows are processed between progress reports.
pub const PROGRESS_INTERVAL: u64 = 100_000;

/// Running counts for one annotation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub total: u64,
    pub mapped: u64,
    pub unmapped: u64,
}

/// Annotate an association results file with reference allele
/// frequencies.
///
/// The input's header line is copied through verbatim. Each data row
/// must carry at least ten whitespace-delimited columns:
///
/// ```text
/// chr pos id a1 a2 freq beta se p n [tail...]
/// ```
///
/// The reference source is queried for the frequency of the row's
/// first allele (the allele pair is passed swapped, so the reported
/// value describes `a1`). On a match the row is re-emitted tab-joined
/// with the looked-up frequency replacing the sixth column and any
/// tail columns preserved; on no match the original line is written
/// unchanged. Both files must be sorted by (chromosome, position).
///
/// Returns the total/mapped/unmapped row counts.
pub fn annotate_file(
    input_filename: &str,
    freq_filename: &str,
    freq_metadata_filename: Option<&str>,
    population: &str,
    output_filename: &str,
) -> Result<RunStats, AnnotateError> {
    let mut freqs = FreqSource::open(freq_filename, freq_metadata_filename, population)?;
    let mut lines = InputFile::new(input_filename).lines()?;
    let mut writer = OutputFile::new(output_filename).writer()?;

    let mut stats = RunStats::default();

    if let Some(header) = lines.next().transpose()? {
        writeln!(writer, "{}", header)?;
    }

    for line in lines {
        let line = line?;
        stats.total += 1;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 {
            return Err(AnnotateError::InputParse {
                filename: input_filename.to_string(),
                line: line.clone(),
            });
        }
        let chrom = fields[0].parse::<Chrom>();
        let pos = fields[1].parse::<Position>();
        let (Ok(chrom), Ok(pos)) = (chrom, pos) else {
            return Err(AnnotateError::InputParse {
                filename: input_filename.to_string(),
                line: line.clone(),
            });
        };
        let (id, a1, a2) = (fields[2], fields[3], fields[4]);
        match freqs.find(chrom, pos, id, a2, a1)? {
            Some(freq) => {
                stats.mapped += 1;
                let mut row = format!(
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    chrom,
                    pos,
                    id,
                    a1,
                    a2,
                    format_freq(freq)
                );
                for tail in &fields[6..] {
                    row.push('\t');
                    row.push_str(tail);
                }
                writeln!(writer, "{}", row)?;
            }
            None => {
                stats.unmapped += 1;
                writeln!(writer, "{}", line)?;
            }
        }
        if stats.total % PROGRESS_INTERVAL == 0 {
            info!(
                "processed {}; mapped {}, unmapped {}",
                stats.total, stats.mapped, stats.unmapped
            );
        }
    }

    writer.flush()?;
    Ok(stats)
}
