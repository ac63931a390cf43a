//! Try a list of named ways to obtain something; the first that works wins.

use std::fmt;

/// One failed strategy and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub strategy: String,
    pub reason: String,
}

/// Every strategy failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeError {
    pub target: String,
    pub attempts: Vec<Attempt>,
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attempts.is_empty() {
            return write!(f, "no way to find {} was configured", self.target);
        }
        write!(f, "could not find {}:", self.target)?;
        for attempt in &self.attempts {
            write!(f, "\n  - {}: {}", attempt.strategy, attempt.reason)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProbeError {}

type Strategy<'a, T> = Box<dyn FnOnce() -> Result<T, String> + 'a>;

/// Ordered capability probe.
///
/// ```
/// use sesmerge_autoroute::probe::Probe;
///
/// let found = Probe::new("a number")
///     .strategy("from text", || "x".parse::<u32>().map_err(|e| e.to_string()))
///     .strategy("constant", || Ok(7))
///     .run()
///     .unwrap();
/// assert_eq!(found, 7);
/// ```
pub struct Probe<'a, T> {
    target: String,
    strategies: Vec<(String, Strategy<'a, T>)>,
}

impl<'a, T> Probe<'a, T> {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            strategies: Vec::new(),
        }
    }

    pub fn strategy<F>(mut self, name: impl Into<String>, attempt: F) -> Self
    where
        F: FnOnce() -> Result<T, String> + 'a,
    {
        self.strategies.push((name.into(), Box::new(attempt)));
        self
    }

    pub fn run(self) -> Result<T, ProbeError> {
        let mut attempts = Vec::new();
        for (name, attempt) in self.strategies {
            match attempt() {
                Ok(found) => {
                    log::debug!("Found {} via {name}", self.target);
                    return Ok(found);
                }
                Err(reason) => {
                    log::trace!("{name}: {reason}");
                    attempts.push(Attempt {
                        strategy: name,
                        reason,
                    });
                }
            }
        }
        Err(ProbeError {
            target: self.target,
            attempts,
        })
    }
}
