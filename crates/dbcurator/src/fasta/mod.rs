//! FASTA streaming primitives plus the header filters and sequence
//! manipulators the curation steps are built from.

pub mod filter;
pub mod manipulator;
pub mod reader;
pub mod writer;

pub use filter::{build_filter, MatchMode, RegexTextFilter, SimpleTextFilter, TextFilter, TextMode};
pub use manipulator::{ManipulatorKind, Reversal, Scramble, SequenceManipulator};
pub use reader::{is_fasta_file_valid, FastaReader};
pub use writer::FastaWriter;
