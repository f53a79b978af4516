//! Encapsulates plaintext and gzip-compressed file input and output.
//!
//! The [`InputFile`] and [`OutputFile`] abstractions are for working with
//! possibly gzip-compressed whitespace-delimited results and frequency
//! files.
//!
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::Write;
use std::io::{self, BufWriter};
use std::io::{BufRead, BufReader, Read};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileError {
    #[error("IO error: {0}")]
    IOError(#[from] io::Error),
}

/// Check if a file is gzipped by looking for the magic numbers.
///
/// Files shorter than the two magic bytes are treated as plaintext, so an
/// empty stream surfaces as a missing header downstream rather than as a
/// read failure here.
fn is_gzipped_file(file_path: &str) -> io::Result<bool> {
    let mut file = File::open(file_path)?;
    let mut buffer = [0; 2];
    let nread = file.read(&mut buffer)?;

    Ok(nread == 2 && buffer == [0x1f, 0x8b])
}

/// Represents an input file.
///
/// This struct is used to handle operations on an input file, such as reading
/// lines from the file. This abstracts how data is read in, allowing for both
/// plaintext and gzip-compressed input to be read through a common interface.
pub struct InputFile {
    pub filepath: String,
}

impl InputFile {
    /// Constructs a new `InputFile`.
    ///
    /// # Arguments
    ///
    /// * `filepath` - A string slice that holds the path to the file. Gzipped
    /// input is detected from the file contents and uncompressed on the fly.
    pub fn new(filepath: &str) -> Self {
        Self {
            filepath: filepath.to_string(),
        }
    }

    /// Opens the file and returns a buffered reader.
    ///
    /// If the file is gzip-compressed (detected from the gzip magic bytes),
    /// this method will automatically handle the decompression.
    ///
    /// # Returns
    ///
    /// A result containing a `BufReader<Box<dyn Read>>` on success, or a
    /// `FileError` on failure.
    ///
    pub fn reader(&self) -> Result<BufReader<Box<dyn Read>>, FileError> {
        let file = File::open(self.filepath.clone())?;
        let is_gzipped = is_gzipped_file(&self.filepath)?;
        let reader: Box<dyn Read> = if is_gzipped {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(BufReader::new(reader))
    }

    /// Opens the file and returns an iterator over its lines, with line
    /// terminators removed.
    pub fn lines(&self) -> Result<io::Lines<BufReader<Box<dyn Read>>>, FileError> {
        Ok(self.reader()?.lines())
    }
}

/// Represents an output file.
///
/// This struct is used to handle operations on an output file, such as
/// writing lines to the file. This abstracts writing both plaintext and
/// gzip-compressed files.
pub struct OutputFile {
    pub filepath: String,
}

impl OutputFile {
    /// Constructs a new `OutputFile`.
    ///
    /// # Arguments
    ///
    /// * `filepath` - A string slice that holds the path to the file. If the
    /// file extension is `.gz`, `OutputFile` will automatically write
    /// gzip-compressed output.
    pub fn new(filepath: &str) -> Self {
        Self {
            filepath: filepath.to_string(),
        }
    }

    /// Opens the file and returns a writer.
    ///
    /// If the file path ends with ".gz", the file is treated as
    /// gzip-compressed, and the function will handle compression
    /// automatically.
    ///
    /// # Returns
    ///
    /// A result containing a `Box<dyn Write>` on success, or an `io::Error`
    /// on failure.
    pub fn writer(&self) -> Result<Box<dyn Write>, io::Error> {
        let outfile = &self.filepath;
        let is_gzip = outfile.ends_with(".gz");
        let writer: Box<dyn Write> = if is_gzip {
            Box::new(BufWriter::new(GzEncoder::new(
                File::create(outfile)?,
                Compression::default(),
            )))
        } else {
            Box::new(BufWriter::new(File::create(outfile)?))
        };
        Ok(writer)
    }
}
