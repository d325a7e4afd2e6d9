//! Result quantifiers: `an`/`a` for every solution, `the` for exactly one.

use crate::error::{Error, Result};
use crate::evaluator::{Solution, Solutions};
use crate::options::EvalOptions;
use crate::query::{IntoQuery, QuerySpec};
use eql_api::{EntityRef, Value};
use std::fmt;
use tracing::debug;

/// Bounds on the number of solutions an [`An`] may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantification {
    Exactly(usize),
    AtLeast(usize),
    AtMost(usize),
    /// Inclusive on both ends.
    Between { min: usize, max: usize },
}

pub fn exactly(n: usize) -> Quantification {
    Quantification::Exactly(n)
}

pub fn at_least(n: usize) -> Quantification {
    Quantification::AtLeast(n)
}

pub fn at_most(n: usize) -> Quantification {
    Quantification::AtMost(n)
}

pub fn between(min: usize, max: usize) -> Quantification {
    Quantification::Between { min, max }
}

impl Quantification {
    pub fn min(&self) -> usize {
        match *self {
            Quantification::Exactly(n) | Quantification::AtLeast(n) => n,
            Quantification::AtMost(_) => 0,
            Quantification::Between { min, .. } => min,
        }
    }

    pub fn max(&self) -> Option<usize> {
        match *self {
            Quantification::Exactly(n) | Quantification::AtMost(n) => Some(n),
            Quantification::AtLeast(_) => None,
            Quantification::Between { max, .. } => Some(max),
        }
    }
}

impl fmt::Display for Quantification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantification::Exactly(n) => write!(f, "exactly {n}"),
            Quantification::AtLeast(n) => write!(f, "at least {n}"),
            Quantification::AtMost(n) => write!(f, "at most {n}"),
            Quantification::Between { min, max } => write!(f, "between {min} and {max}"),
        }
    }
}

/// Every solution of a query, lazily.
#[derive(Debug, Clone)]
pub struct An {
    query: QuerySpec,
    quantification: Option<Quantification>,
    options: EvalOptions,
}

pub fn an(query: impl IntoQuery) -> Result<An> {
    let query = query.into_query()?;
    Ok(An {
        query,
        quantification: None,
        options: EvalOptions::default(),
    })
}

pub fn a(query: impl IntoQuery) -> Result<An> {
    an(query)
}

impl An {
    /// Requires the number of solutions to fall within `quantification`.
    ///
    /// A violation surfaces as an `Err` item from [`Results`]: as soon as
    /// the maximum is exceeded, or at exhaustion when the minimum is not met.
    pub fn quantified(mut self, quantification: Quantification) -> Self {
        self.quantification = Some(quantification);
        self
    }

    pub fn with_options(mut self, options: EvalOptions) -> Self {
        self.options = options;
        self
    }

    pub fn query(&self) -> &QuerySpec {
        &self.query
    }

    /// Starts a new enumeration. Each call searches again from scratch, so
    /// changes to the domains since the last call are visible.
    pub fn evaluate(&self) -> Results {
        Results {
            inner: self.query.solutions_with(self.options.clone()),
            quantification: self.quantification,
            count: 0,
            done: false,
        }
    }

    pub fn to_vec(&self) -> Result<Vec<Solution>> {
        self.evaluate().collect()
    }

    /// The values of the first output variable, in solution order.
    pub fn values(&self) -> Result<Vec<Value>> {
        self.evaluate()
            .map(|s| {
                s.map(|s| {
                    s.into_columns()
                        .into_iter()
                        .next()
                        .map(|(_, v)| v)
                        .unwrap_or(Value::Null)
                })
            })
            .collect()
    }
}

/// Solutions of an [`An`], checked against its quantification.
pub struct Results {
    inner: Solutions,
    quantification: Option<Quantification>,
    count: usize,
    done: bool,
}

impl Results {
    fn violated(&mut self) -> Option<Result<Solution>> {
        self.done = true;
        let expected = self
            .quantification
            .map(|q| q.to_string())
            .unwrap_or_default();
        debug!(expected = %expected, found = self.count, "quantification violated");
        Some(Err(Error::QuantificationViolated {
            expected,
            found: self.count,
        }))
    }
}

impl Iterator for Results {
    type Item = Result<Solution>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.inner.next() {
            Some(Ok(solution)) => {
                self.count += 1;
                if let Some(max) = self.quantification.and_then(|q| q.max())
                    && self.count > max
                {
                    return self.violated();
                }
                Some(Ok(solution))
            }
            Some(Err(e)) => {
                self.done = true;
                Some(Err(e))
            }
            None => {
                self.done = true;
                match self.quantification {
                    Some(q) if self.count < q.min() => self.violated(),
                    _ => None,
                }
            }
        }
    }
}

/// The single solution of a query.
#[derive(Debug, Clone)]
pub struct The {
    query: QuerySpec,
    options: EvalOptions,
}

pub fn the(query: impl IntoQuery) -> Result<The> {
    Ok(The {
        query: query.into_query()?,
        options: EvalOptions::default(),
    })
}

impl The {
    pub fn with_options(mut self, options: EvalOptions) -> Self {
        self.options = options;
        self
    }

    pub fn query(&self) -> &QuerySpec {
        &self.query
    }

    /// Runs the search until a second solution is seen or the space is exhausted.
    pub fn evaluate(&self) -> Result<Answer> {
        let mut solutions = self.query.solutions_with(self.options.clone());
        let first = solutions.next().ok_or(Error::NoMatch)??;
        if let Some(second) = solutions.next() {
            second?;
            return Err(Error::MultipleMatches);
        }
        if first.len() == 1 {
            let value = first
                .into_columns()
                .pop()
                .map(|(_, v)| v)
                .unwrap_or(Value::Null);
            Ok(Answer::Value(value))
        } else {
            Ok(Answer::Solution(first))
        }
    }
}

/// Result of [`The::evaluate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    /// The value of the sole output variable.
    Value(Value),
    /// Bindings of all output variables.
    Solution(Solution),
}

impl Answer {
    pub fn value(&self) -> Option<&Value> {
        match self {
            Answer::Value(v) => Some(v),
            Answer::Solution(_) => None,
        }
    }

    pub fn entity(&self) -> Option<&EntityRef> {
        self.value().and_then(Value::as_entity)
    }

    pub fn solution(&self) -> Option<&Solution> {
        match self {
            Answer::Value(_) => None,
            Answer::Solution(s) => Some(s),
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Answer::Value(v) => Some(v),
            Answer::Solution(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantification_bounds() {
        assert_eq!(exactly(2).min(), 2);
        assert_eq!(exactly(2).max(), Some(2));
        assert_eq!(at_least(1).max(), None);
        assert_eq!(at_most(3).min(), 0);
        assert_eq!(between(1, 4).to_string(), "between 1 and 4");
    }
}
