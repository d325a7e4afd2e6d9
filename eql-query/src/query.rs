//! Variable declaration and query construction.

use crate::error::{Error, Result};
use crate::evaluator::Solutions;
use crate::options::EvalOptions;
use crate::pattern::EntityMatch;
use crate::planner::{Plan, build_plan};
use crate::render;
use crate::term::{Term, Var};
use eql_api::{Domain, EntityType};
use std::sync::Arc;
use tracing::debug;

/// Declares a variable over the instances of `ty` found in `domain`.
///
/// Members that are not instances of `ty` are skipped during search.
/// The variable is named after the type.
pub fn let_(ty: &'static EntityType, domain: impl Into<Domain>) -> Var {
    Var::new(ty, Some(domain.into()), None)
}

pub fn let_named(ty: &'static EntityType, domain: impl Into<Domain>, name: &str) -> Var {
    Var::new(ty, Some(domain.into()), Some(name))
}

/// Declares a variable with no domain of its own. It must be reachable
/// through an equality with a term over other variables.
pub fn var(ty: &'static EntityType, name: &str) -> Var {
    Var::new(ty, None, Some(name))
}

/// A validated, ready to evaluate query: the output variables and the
/// constraint they must satisfy.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    outputs: Vec<Var>,
    constraint: Term,
    plan: Arc<Plan>,
}

/// Query over a single output variable. Several constraints are conjoined.
pub fn entity(selected: &Var, constraints: impl IntoIterator<Item = Term>) -> Result<QuerySpec> {
    QuerySpec::new(vec![selected.clone()], Term::conjunction(constraints))
}

/// Query over several output variables; solutions bind all of them.
pub fn set_of<'a>(
    selected: impl IntoIterator<Item = &'a Var>,
    constraints: impl IntoIterator<Item = Term>,
) -> Result<QuerySpec> {
    QuerySpec::new(
        selected.into_iter().cloned().collect(),
        Term::conjunction(constraints),
    )
}

impl QuerySpec {
    pub(crate) fn new(outputs: Vec<Var>, constraint: Term) -> Result<Self> {
        let plan = build_plan(&outputs, &constraint)?;
        debug!(
            outputs = ?outputs.iter().map(Var::name).collect::<Vec<_>>(),
            "query built"
        );
        Ok(Self {
            outputs,
            constraint,
            plan: Arc::new(plan),
        })
    }

    pub fn outputs(&self) -> &[Var] {
        &self.outputs
    }

    pub fn constraint(&self) -> &Term {
        &self.constraint
    }

    /// Starts a fresh, lazy enumeration with default options.
    pub fn solutions(&self) -> Solutions {
        self.solutions_with(EvalOptions::default())
    }

    pub fn solutions_with(&self, options: EvalOptions) -> Solutions {
        Solutions::new(self.plan.clone(), options)
    }

    /// Human readable description of the outputs, variable sources and constraint.
    pub fn explain(&self) -> String {
        render::explain(&self.plan, &self.constraint)
    }
}

/// Anything a quantifier can run: a built query, the result of building
/// one, or an unbuilt [`EntityMatch`].
pub trait IntoQuery {
    fn into_query(self) -> Result<QuerySpec>;
}

impl IntoQuery for QuerySpec {
    fn into_query(self) -> Result<QuerySpec> {
        Ok(self)
    }
}

impl IntoQuery for &QuerySpec {
    fn into_query(self) -> Result<QuerySpec> {
        Ok(self.clone())
    }
}

impl IntoQuery for Result<QuerySpec> {
    fn into_query(self) -> Result<QuerySpec> {
        self
    }
}

impl IntoQuery for EntityMatch {
    fn into_query(self) -> Result<QuerySpec> {
        self.build()
    }
}

impl TryFrom<EntityMatch> for QuerySpec {
    type Error = Error;

    fn try_from(m: EntityMatch) -> Result<Self> {
        m.build()
    }
}
