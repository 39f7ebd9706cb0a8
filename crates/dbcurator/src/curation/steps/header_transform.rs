use regex::Regex;

use crate::curation::step::{CurationStep, StepDescriptor, StepState};
use crate::curation::steps::report_progress;
use crate::curation::StepValidation;
use crate::error::FastaError;
use crate::executor::{ExecutionContext, RunStatus};
use crate::fasta::{FastaReader, FastaWriter};
use crate::store::CurationStore;

/// Rewrites every header that matches a regular expression.
///
/// The substitution uses `$1`-style group references. A digit run after
/// `$` is always a group number, and `\$` is a literal dollar sign.
#[derive(Debug, Clone, Default)]
pub struct HeaderTransformStep {
    description: Option<String>,
    match_pattern: Option<String>,
    substitution_pattern: Option<String>,
    state: StepState,
}

impl HeaderTransformStep {
    pub fn new(
        description: impl Into<String>,
        match_pattern: impl Into<String>,
        substitution_pattern: impl Into<String>,
    ) -> Self {
        Self::from_parts(
            Some(description.into()),
            Some(match_pattern.into()),
            Some(substitution_pattern.into()),
        )
    }

    pub fn from_parts(
        description: Option<String>,
        match_pattern: Option<String>,
        substitution_pattern: Option<String>,
    ) -> Self {
        Self {
            description,
            match_pattern,
            substitution_pattern,
            state: StepState::default(),
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn compiled(&self) -> Result<(Regex, &str), StepValidation> {
        let mut validation = StepValidation::new();
        let pattern = match self.match_pattern.as_deref() {
            None | Some("") => {
                validation.add_message("No match pattern has been entered.");
                None
            }
            Some(p) => match Regex::new(p) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    validation.add_message_with_cause("Invalid match pattern", e);
                    None
                }
            },
        };
        let substitution = self.substitution_pattern.as_deref();
        if substitution.is_none() {
            validation.add_message("No substitution pattern has been entered.");
        }
        match (pattern, substitution) {
            (Some(pattern), Some(substitution)) if validation.is_ok() => Ok((pattern, substitution)),
            _ => Err(validation),
        }
    }
}

impl CurationStep for HeaderTransformStep {
    fn pre_validate(&self, _store: &dyn CurationStore) -> StepValidation {
        match self.compiled() {
            Ok(_) => StepValidation::new(),
            Err(validation) => validation,
        }
    }

    fn perform(&mut self, ctx: &mut ExecutionContext) -> StepValidation {
        let compiled = self
            .compiled()
            .map(|(pattern, substitution)| (pattern, substitution.to_string()));
        let (pattern, substitution) = match compiled {
            Ok(compiled) => compiled,
            Err(validation) => {
                self.state.record(&validation);
                return validation;
            }
        };

        let mut validation = StepValidation::new();
        let expected = ctx.status().last_step_sequence_count();
        let status = ctx.status().clone();
        let (input, output) = ctx.streams();
        match input {
            None => validation.add_message("There are no sequences to transform."),
            Some(input) => {
                if let Err(e) =
                    transform_all(input, output, &pattern, &substitution, &status, expected)
                {
                    validation.add_message_with_cause("Error transforming headers", e);
                }
                validation.set_completion_count(output.sequence_count() as i64);
            }
        }

        self.state.record(&validation);
        validation
    }

    fn copy(&self) -> Box<dyn CurationStep> {
        Box::new(Self::from_parts(
            self.description.clone(),
            self.match_pattern.clone(),
            self.substitution_pattern.clone(),
        ))
    }

    fn describe(&self) -> Option<String> {
        None
    }

    fn descriptor(&self) -> Option<StepDescriptor> {
        Some(StepDescriptor::HeaderTransform {
            description: self.description.clone(),
            match_pattern: self.match_pattern.clone(),
            substitution_pattern: self.substitution_pattern.clone(),
        })
    }

    fn state(&self) -> &StepState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StepState {
        &mut self.state
    }
}

fn transform_all(
    input: &mut FastaReader,
    output: &mut FastaWriter,
    pattern: &Regex,
    substitution: &str,
    status: &RunStatus,
    expected: i64,
) -> Result<(), FastaError> {
    input.before_first()?;
    let mut processed = 0usize;
    while input.next_sequence()? {
        let header = rewrite_header(pattern, substitution, input.header());
        output.append_sequence(&header, input.sequence())?;
        processed += 1;
        report_progress(status, processed, expected, 100.0, 0.0);
    }
    Ok(())
}

/// Replaces every match of `pattern` in `header`. When the result is just
/// the substitution text itself, the original header is kept.
pub fn rewrite_header(pattern: &Regex, substitution: &str, header: &str) -> String {
    let replacement = expand_group_references(substitution);
    let rewritten = pattern.replace_all(header, replacement.as_str());
    if rewritten.eq_ignore_ascii_case(substitution) {
        return header.to_string();
    }
    rewritten.into_owned()
}

/// `$12` becomes `${12}` and `\$` becomes `$$`, so group numbers are never
/// read as part of a longer group name.
fn expand_group_references(substitution: &str) -> String {
    let mut expanded = String::with_capacity(substitution.len() + 8);
    let mut chars = substitution.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'$') => {
                chars.next();
                expanded.push_str("$$");
            }
            '$' if chars.peek().is_some_and(|n| n.is_ascii_digit()) => {
                expanded.push_str("${");
                while let Some(d) = chars.peek().copied().filter(|d| d.is_ascii_digit()) {
                    expanded.push(d);
                    chars.next();
                }
                expanded.push('}');
            }
            '$' => expanded.push_str("$$"),
            other => expanded.push(other),
        }
    }
    expanded
}
