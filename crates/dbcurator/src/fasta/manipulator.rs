use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Produces a decoy sequence from a target sequence.
pub trait SequenceManipulator: Send {
    /// Short label used in decoy headers, e.g. `Reversed`.
    fn description(&self) -> &'static str;

    fn manipulate(&mut self, sequence: &str) -> String;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManipulatorKind {
    #[default]
    Reversal,
    Scramble,
}

impl ManipulatorKind {
    pub fn description(&self) -> &'static str {
        match self {
            ManipulatorKind::Reversal => Reversal.description(),
            ManipulatorKind::Scramble => "Scrambled",
        }
    }

    pub fn build(&self) -> Box<dyn SequenceManipulator> {
        match self {
            ManipulatorKind::Reversal => Box::new(Reversal),
            ManipulatorKind::Scramble => Box::new(Scramble::new()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Reversal;

impl SequenceManipulator for Reversal {
    fn description(&self) -> &'static str {
        "Reversed"
    }

    fn manipulate(&mut self, sequence: &str) -> String {
        sequence.chars().rev().collect()
    }
}

/// Random permutation of the residues.
#[derive(Debug)]
pub struct Scramble {
    rng: StdRng,
}

impl Scramble {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic scrambling for reproducible output.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for Scramble {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceManipulator for Scramble {
    fn description(&self) -> &'static str {
        "Scrambled"
    }

    fn manipulate(&mut self, sequence: &str) -> String {
        let mut residues: Vec<char> = sequence.chars().collect();
        residues.shuffle(&mut self.rng);
        residues.into_iter().collect()
    }
}
