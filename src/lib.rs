//! Functionality for annotating association results with reference
//! allele frequencies.
//!
//! A [`FreqSource`] wraps a sorted reference frequency source, either a
//! single combined file with one frequency column per population or a
//! split pair of metadata and per-line frequency value files, and
//! exposes a forward-only cursor over it. [`annotate_file`] streams a
//! results file sorted the same way past that cursor, appending the
//! looked-up frequency of each row's first allele and passing unmatched
//! rows through untouched.
//!
//! Here is an example which annotates a results file against a combined
//! reference panel, reporting European frequencies:
//!
//! ```no_run
//! use freqanno::prelude::*;
//! let stats = annotate_file(
//!     "assoc.txt.gz",
//!     "reference_freqs.txt.gz",
//!     None,
//!     "EUR",
//!     "assoc.annotated.txt.gz",
//! )
//! .expect("cannot annotate results");
//! println!("{} mapped, {} unmapped", stats.mapped, stats.unmapped);
//! ```
//!
//! This is also available from the command line:
//!
//! ```bash
//! freqanno -i assoc.txt.gz -f reference_freqs.txt.gz -s EUR \
//!     -o assoc.annotated.txt.gz
//! ```
//!
//! Individual lookups can be made directly against the cursor; note
//! that both the queries and the reference must be sorted by
//! (chromosome, position), since the cursor never rewinds.
//!
//! ```no_run
//! use freqanno::prelude::*;
//! let mut freqs = FreqSource::open("reference_freqs.txt.gz", None, "EUR")
//!     .expect("cannot open frequency file");
//! if let Some(freq) = freqs
//!     .find(1, 55550, "chr1:55550:A:G", "G", "A")
//!     .expect("frequency file unreadable")
//! {
//!     println!("frequency of A: {}", freq);
//! }
//! ```

pub mod annotate;
pub mod file;
pub mod freq;

pub use annotate::{annotate_file, RunStats};
pub use freq::{AnnotateError, Chrom, Freq, FreqSource, Position, VariantRecord};

pub mod prelude {
    pub use crate::annotate::{annotate_file, RunStats};
    pub use crate::freq::{AnnotateError, Chrom, Freq, FreqSource, Position, VariantRecord};
}
