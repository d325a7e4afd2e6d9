//! Term evaluation and the backtracking search that enumerates solutions.

use crate::capture::Bindings;
use crate::error::{Error, Result};
use crate::options::EvalOptions;
use crate::planner::{Plan, Source};
use crate::term::{CompareOp, Term, Var};
use eql_api::{EntityRef, Value};
use serde::ser::SerializeMap;
use std::sync::Arc;
use tracing::{debug, trace};

pub(crate) fn eval_value(term: &Term, env: &dyn Bindings) -> Result<Value> {
    match term {
        Term::Literal(v) => Ok(v.clone()),
        Term::Var(var) => env
            .lookup(var)
            .cloned()
            .ok_or_else(|| Error::UnboundVariable(var.name().to_string())),
        Term::AttributePath { base, name } => {
            let base = eval_value(base, env)?;
            read_attribute(&base, name)
        }
        _ => Ok(Value::Bool(eval_bool(term, env)?)),
    }
}

pub(crate) fn eval_bool(term: &Term, env: &dyn Bindings) -> Result<bool> {
    match term {
        Term::And(terms) => {
            for t in terms {
                if !eval_bool(t, env)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Term::Or(terms) => {
            for t in terms {
                if eval_bool(t, env)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Term::Not(inner) => Ok(!eval_bool(inner, env)?),
        Term::Compare { op, left, right } => {
            let left = eval_value(left, env)?;
            let right = eval_value(right, env)?;
            compare_values(*op, &left, &right)
        }
        Term::TypeTest { term, ty } => Ok(eval_value(term, env)?.is_instance_of(ty)),
        Term::Contains {
            collection,
            element,
        } => {
            let haystack = eval_value(collection, env)?;
            let needle = eval_value(element, env)?;
            match (&haystack, &needle) {
                (Value::Null, _) => Ok(false),
                (Value::List(items), _) => Ok(items.contains(&needle)),
                (Value::String(s), Value::String(sub)) => Ok(s.contains(sub.as_str())),
                (Value::String(_), Value::Null) => Ok(false),
                (Value::String(_), other) => Err(Error::Incomparable {
                    op: "in",
                    left: other.kind().to_string(),
                    right: "String".to_string(),
                }),
                _ => Err(Error::NotACollection(collection.to_string())),
            }
        }
        Term::ExistsIn {
            collection,
            element,
            condition,
        } => {
            for item in collection_items(collection, env)? {
                if !item.is_instance_of(element.entity_type()) {
                    continue;
                }
                let scoped = Scoped {
                    parent: env,
                    var: element,
                    value: item,
                };
                if eval_bool(condition, &scoped)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Term::ForAll {
            collection,
            element,
            condition,
        } => {
            for item in collection_items(collection, env)? {
                if !item.is_instance_of(element.entity_type()) {
                    continue;
                }
                let scoped = Scoped {
                    parent: env,
                    var: element,
                    value: item,
                };
                if !eval_bool(condition, &scoped)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Term::Literal(_) | Term::Var(_) | Term::AttributePath { .. } => {
            match eval_value(term, env)? {
                Value::Bool(b) => Ok(b),
                Value::Null => Ok(false),
                _ => Err(Error::NotABoolean(term.to_string())),
            }
        }
    }
}

/// Members of a collection-valued term. An absent collection is empty.
pub(crate) fn collection_items(term: &Term, env: &dyn Bindings) -> Result<Vec<Value>> {
    match eval_value(term, env)? {
        Value::List(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        _ => Err(Error::NotACollection(term.to_string())),
    }
}

fn read_attribute(base: &Value, name: &str) -> Result<Value> {
    match base {
        Value::Null => Ok(Value::Null),
        Value::Entity(entity) => {
            let ty = entity.entity_type();
            if !ty.declares(name) {
                return Err(Error::StructuralAttribute {
                    entity_type: ty.name.to_string(),
                    attribute: name.to_string(),
                });
            }
            Ok(entity.attribute(name).unwrap_or(Value::Null))
        }
        other => Err(Error::StructuralAttribute {
            entity_type: other.kind().to_string(),
            attribute: name.to_string(),
        }),
    }
}

/// Absent values never order against anything.
pub(crate) fn compare_values(op: CompareOp, left: &Value, right: &Value) -> Result<bool> {
    let ordering = match op {
        CompareOp::Eq => return Ok(left == right),
        CompareOp::Ne => return Ok(left != right),
        _ => match (left, right) {
            (Value::Null, _) | (_, Value::Null) => return Ok(false),
            (Value::Int(l), Value::Int(r)) => Some(l.cmp(r)),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                let (Some(l), Some(r)) = (left.as_float(), right.as_float()) else {
                    return Ok(false);
                };
                l.partial_cmp(&r)
            }
            (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
            (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
            _ => {
                return Err(Error::Incomparable {
                    op: op.symbol(),
                    left: left.kind().to_string(),
                    right: right.kind().to_string(),
                });
            }
        },
    };
    let Some(ordering) = ordering else {
        return Ok(false);
    };
    Ok(match op {
        CompareOp::Eq => ordering.is_eq(),
        CompareOp::Ne => ordering.is_ne(),
        CompareOp::Lt => ordering.is_lt(),
        CompareOp::Le => ordering.is_le(),
        CompareOp::Gt => ordering.is_gt(),
        CompareOp::Ge => ordering.is_ge(),
    })
}

/// Binds one element variable on top of an outer environment.
struct Scoped<'a> {
    parent: &'a dyn Bindings,
    var: &'a Var,
    value: Value,
}

impl Bindings for Scoped<'_> {
    fn lookup(&self, var: &Var) -> Option<&Value> {
        if var == self.var {
            Some(&self.value)
        } else {
            self.parent.lookup(var)
        }
    }
}

/// The partial assignment of the search: one slot per plan variable.
struct SlotEnv<'a> {
    plan: &'a Plan,
    slots: &'a [Option<Value>],
}

impl Bindings for SlotEnv<'_> {
    fn lookup(&self, var: &Var) -> Option<&Value> {
        let slot = self.plan.slot_of(var)?;
        self.slots[slot].as_ref()
    }
}

/// One solution: the values of the output variables, in selection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Solution {
    // Few outputs per query: linear search is fine.
    cols: Vec<(Var, Value)>,
}

impl Solution {
    pub fn new(cols: Vec<(Var, Value)>) -> Self {
        Self { cols }
    }

    /// The value bound to `var`, or `None` when `var` is not an output.
    pub fn value(&self, var: &Var) -> Option<&Value> {
        self.cols.iter().find(|(v, _)| v == var).map(|(_, value)| value)
    }

    pub fn entity(&self, var: &Var) -> Option<&EntityRef> {
        self.value(var).and_then(Value::as_entity)
    }

    /// First column whose variable carries `name`.
    pub fn by_name(&self, name: &str) -> Option<&Value> {
        self.cols
            .iter()
            .find(|(v, _)| v.name() == name)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> &[(Var, Value)] {
        &self.cols
    }

    pub fn vars(&self) -> impl Iterator<Item = &Var> {
        self.cols.iter().map(|(v, _)| v)
    }

    pub fn len(&self) -> usize {
        self.cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    pub fn into_columns(self) -> Vec<(Var, Value)> {
        self.cols
    }
}

impl Bindings for Solution {
    fn lookup(&self, var: &Var) -> Option<&Value> {
        self.value(var)
    }
}

impl serde::Serialize for Solution {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cols.len()))?;
        for (var, value) in &self.cols {
            map.serialize_entry(var.name(), value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Pending,
    Running,
    Done,
}

/// Lazy, depth-first enumeration of the solutions of a plan.
///
/// Each call to `next` resumes the search from the last choice point and
/// runs until the next complete assignment. Domains are read when a level
/// is entered, so mutations between evaluations are always observed.
pub struct Solutions {
    plan: Arc<Plan>,
    options: EvalOptions,
    state: State,
    /// slot bound at each search level
    order: Vec<usize>,
    /// conjuncts whose last variable binds at each level
    checks: Vec<Vec<usize>>,
    slots: Vec<Option<Value>>,
    frames: Vec<std::vec::IntoIter<Value>>,
    steps: usize,
    yielded: usize,
}

impl Solutions {
    pub(crate) fn new(plan: Arc<Plan>, options: EvalOptions) -> Self {
        let slots = vec![None; plan.vars.len()];
        Self {
            plan,
            options,
            state: State::Pending,
            order: Vec::new(),
            checks: Vec::new(),
            slots,
            frames: Vec::new(),
            steps: 0,
            yielded: 0,
        }
    }

    /// Number of candidate bindings tried so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    fn start(&mut self) -> Result<bool> {
        self.order = self.plan.search_order(self.options.order);
        self.checks = self.plan.level_checks(&self.order);
        debug!(
            order = ?self
                .order
                .iter()
                .map(|&slot| self.plan.vars[slot].name())
                .collect::<Vec<_>>(),
            "starting evaluation"
        );
        for &idx in &self.plan.ground {
            if !self.check(idx)? {
                debug!("ground constraint fails, no solutions");
                return Ok(false);
            }
        }
        if let Some(&slot) = self.order.first() {
            let candidates = self.candidates(slot)?;
            self.frames.push(candidates.into_iter());
        }
        Ok(true)
    }

    fn check(&self, conjunct: usize) -> Result<bool> {
        let env = SlotEnv {
            plan: &self.plan,
            slots: &self.slots,
        };
        eval_bool(&self.plan.conjuncts[conjunct].term, &env)
    }

    fn candidates(&self, slot: usize) -> Result<Vec<Value>> {
        let env = SlotEnv {
            plan: &self.plan,
            slots: &self.slots,
        };
        match &self.plan.sources[slot] {
            Source::Domain(domain) => Ok(domain.members().collect()),
            Source::Derived(term) => Ok(vec![eval_value(term, &env)?]),
            Source::Elements(term) => collection_items(term, &env),
        }
    }

    fn level_holds(&self, level: usize) -> Result<bool> {
        for &idx in &self.checks[level] {
            if !self.check(idx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn project(&self) -> Solution {
        let cols = self
            .plan
            .outputs
            .iter()
            .map(|&slot| {
                let value = self.slots[slot].clone().unwrap_or(Value::Null);
                (self.plan.vars[slot].clone(), value)
            })
            .collect();
        Solution { cols }
    }

    fn finish(&mut self) {
        self.state = State::Done;
        self.frames.clear();
        debug!(solutions = self.yielded, steps = self.steps, "evaluation finished");
    }

    fn fail(&mut self, err: Error) -> Option<Result<Solution>> {
        self.finish();
        Some(Err(err))
    }

    fn search(&mut self) -> Option<Result<Solution>> {
        loop {
            let level = self.frames.len().checked_sub(1)?;
            let slot = self.order[level];
            let Some(candidate) = self.frames[level].next() else {
                self.frames.pop();
                self.slots[slot] = None;
                continue;
            };

            self.steps += 1;
            if self.steps > self.options.max_steps {
                return self.fail(Error::SearchLimitExceeded(self.options.max_steps));
            }

            let var = &self.plan.vars[slot];
            if !candidate.is_instance_of(var.entity_type()) {
                trace!(var = var.name(), candidate = %candidate, "skipping non-instance");
                continue;
            }
            self.slots[slot] = Some(candidate);

            match self.level_holds(level) {
                Ok(true) => {}
                Ok(false) => {
                    trace!(var = self.plan.vars[slot].name(), level, "pruned");
                    continue;
                }
                Err(e) => return self.fail(e),
            }

            if level + 1 == self.order.len() {
                return Some(Ok(self.project()));
            }
            match self.candidates(self.order[level + 1]) {
                Ok(next) => self.frames.push(next.into_iter()),
                Err(e) => return self.fail(e),
            }
        }
    }
}

impl Iterator for Solutions {
    type Item = Result<Solution>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            State::Done => return None,
            State::Pending => {
                self.state = State::Running;
                match self.start() {
                    Ok(true) => {}
                    Ok(false) => {
                        self.finish();
                        return None;
                    }
                    Err(e) => return self.fail(e),
                }
            }
            State::Running => {}
        }
        match self.search() {
            Some(Ok(solution)) => {
                self.yielded += 1;
                trace!(yielded = self.yielded, "solution");
                Some(Ok(solution))
            }
            Some(Err(e)) => Some(Err(e)),
            None => {
                self.finish();
                None
            }
        }
    }
}
