use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Outcome report of validating or performing a step.
///
/// A report is ok exactly when it carries no messages.
#[derive(Clone, Debug)]
pub struct StepValidation {
    messages: Vec<String>,
    causes: Vec<Arc<dyn Error + Send + Sync>>,
    completion_count: i64,
}

impl StepValidation {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            causes: Vec::new(),
            completion_count: -1,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn causes(&self) -> &[Arc<dyn Error + Send + Sync>] {
        &self.causes
    }

    pub fn add_message(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn add_message_with_cause<E>(&mut self, message: impl Into<String>, cause: E)
    where
        E: Error + Send + Sync + 'static,
    {
        self.messages.push(message.into());
        self.causes.push(Arc::new(cause));
    }

    /// Appends every message and cause of `other`.
    pub fn merge(&mut self, other: StepValidation) {
        self.messages.extend(other.messages);
        self.causes.extend(other.causes);
    }

    /// Records produced by the step, `-1` when unknown.
    pub fn completion_count(&self) -> i64 {
        self.completion_count
    }

    pub fn set_completion_count(&mut self, count: i64) {
        self.completion_count = count;
    }
}

impl Default for StepValidation {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StepValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return write!(f, "ok");
        }
        write!(f, "{}", self.messages.join("; "))?;
        for cause in &self.causes {
            let mut source: Option<&(dyn Error + 'static)> = Some(cause.as_ref());
            while let Some(err) = source {
                write!(f, "\n  caused by: {}", err)?;
                source = err.source();
            }
        }
        Ok(())
    }
}
