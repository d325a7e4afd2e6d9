use crate::error::{Error, Result};
use crate::options::SearchOrder;
use crate::term::{CompareOp, Term, Var};
use eql_api::Domain;
use smallvec::SmallVec;
use std::collections::HashMap;
use tracing::debug;

/// Where a variable's candidates come from.
#[derive(Debug, Clone)]
pub(crate) enum Source {
    /// Every member of an explicit domain.
    Domain(Domain),
    /// The single value of a term over already bound variables.
    Derived(Term),
    /// Each member of a collection-valued term.
    Elements(Term),
}

impl Source {
    pub(crate) fn term(&self) -> Option<&Term> {
        match self {
            Source::Domain(_) => None,
            Source::Derived(t) | Source::Elements(t) => Some(t),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Conjunct {
    pub(crate) term: Term,
    pub(crate) slots: SmallVec<[usize; 4]>,
}

/// A query constraint prepared for search: variables numbered into slots,
/// a candidate source per slot and the top-level conjuncts to check.
#[derive(Debug)]
pub(crate) struct Plan {
    pub(crate) vars: Vec<Var>,
    index: HashMap<Var, usize>,
    pub(crate) sources: Vec<Source>,
    /// slots each source reads
    pub(crate) deps: Vec<SmallVec<[usize; 4]>>,
    pub(crate) conjuncts: Vec<Conjunct>,
    /// conjuncts without variables, checked once before the search
    pub(crate) ground: Vec<usize>,
    pub(crate) outputs: Vec<usize>,
}

enum Item {
    Check(Term),
    Lift { element: Var, collection: Term },
}

pub(crate) fn build_plan(outputs: &[Var], constraint: &Term) -> Result<Plan> {
    if outputs.is_empty() {
        return Err(Error::MalformedPattern(
            "a query must select at least one variable".to_string(),
        ));
    }

    let mut items = Vec::new();
    let mut lifted = Vec::new();
    flatten(constraint, &mut lifted, &mut items);

    let mut vars = Vec::new();
    let mut index = HashMap::new();
    for out in outputs {
        if index.contains_key(out) {
            return Err(Error::MalformedPattern(format!(
                "variable `{}` is selected more than once",
                out.name()
            )));
        }
        intern(&mut vars, &mut index, out);
    }

    let mut elements: HashMap<usize, Term> = HashMap::new();
    let mut checks = Vec::new();
    for item in items {
        match item {
            Item::Check(term) => {
                for v in term.free_vars() {
                    intern(&mut vars, &mut index, &v);
                }
                checks.push(term);
            }
            Item::Lift {
                element,
                collection,
            } => {
                for v in collection.free_vars() {
                    intern(&mut vars, &mut index, &v);
                }
                let slot = intern(&mut vars, &mut index, &element);
                elements.insert(slot, collection);
            }
        }
    }

    let sources = resolve_sources(&vars, &index, &elements, &checks)?;
    let deps = sources
        .iter()
        .map(|source| {
            source
                .term()
                .map(|t| slots_of(t, &index))
                .unwrap_or_default()
        })
        .collect();

    let mut conjuncts = Vec::with_capacity(checks.len());
    let mut ground = Vec::new();
    for term in checks {
        let slots = slots_of(&term, &index);
        if slots.is_empty() {
            ground.push(conjuncts.len());
        }
        conjuncts.push(Conjunct { term, slots });
    }

    let outputs = outputs.iter().filter_map(|v| index.get(v).copied()).collect();
    debug!(
        vars = vars.len(),
        conjuncts = conjuncts.len(),
        lifted = elements.len(),
        "planned query"
    );
    Ok(Plan {
        vars,
        index,
        sources,
        deps,
        conjuncts,
        ground,
        outputs,
    })
}

/// Splits the top-level conjunction. Each existential in conjunctive
/// position becomes a search variable over its collection, so every
/// satisfying element yields its own solution, and its condition joins the
/// top level. An element variable already lifted elsewhere stays a scoped
/// check at its second occurrence.
fn flatten(term: &Term, lifted: &mut Vec<Var>, items: &mut Vec<Item>) {
    match term {
        Term::And(terms) => {
            for t in terms {
                flatten(t, lifted, items);
            }
        }
        Term::ExistsIn {
            collection,
            element,
            condition,
        } if !lifted.contains(element) => {
            lifted.push(element.clone());
            items.push(Item::Lift {
                element: element.clone(),
                collection: (**collection).clone(),
            });
            flatten(condition, lifted, items);
        }
        other => items.push(Item::Check(other.clone())),
    }
}

fn intern(vars: &mut Vec<Var>, index: &mut HashMap<Var, usize>, var: &Var) -> usize {
    if let Some(&slot) = index.get(var) {
        return slot;
    }
    let slot = vars.len();
    vars.push(var.clone());
    index.insert(var.clone(), slot);
    slot
}

fn slots_of(term: &Term, index: &HashMap<Var, usize>) -> SmallVec<[usize; 4]> {
    term.free_vars()
        .iter()
        .filter_map(|v| index.get(v).copied())
        .collect()
}

fn resolvable(term: &Term, index: &HashMap<Var, usize>, resolved: &[bool]) -> bool {
    term.free_vars()
        .iter()
        .all(|v| index.get(v).is_some_and(|&slot| resolved[slot]))
}

/// `var == t` or `t == var` where `t` does not mention `var`.
fn derivation<'a>(term: &'a Term, var: &Var) -> Option<&'a Term> {
    let Term::Compare {
        op: CompareOp::Eq,
        left,
        right,
    } = term
    else {
        return None;
    };
    if left.as_var() == Some(var) && !right.mentions(var) {
        Some(right)
    } else if right.as_var() == Some(var) && !left.mentions(var) {
        Some(left)
    } else {
        None
    }
}

fn resolve_sources(
    vars: &[Var],
    index: &HashMap<Var, usize>,
    elements: &HashMap<usize, Term>,
    checks: &[Term],
) -> Result<Vec<Source>> {
    let mut sources: Vec<Option<Source>> = vars.iter().map(|_| None).collect();
    let mut resolved = vec![false; vars.len()];

    for (slot, var) in vars.iter().enumerate() {
        if elements.contains_key(&slot) {
            continue;
        }
        if let Some(domain) = var.domain() {
            sources[slot] = Some(Source::Domain(domain.clone()));
            resolved[slot] = true;
        }
    }

    // Derived and element variables become available once everything they read is.
    loop {
        let mut changed = false;
        for (slot, var) in vars.iter().enumerate() {
            if resolved[slot] {
                continue;
            }
            let source = match elements.get(&slot) {
                Some(collection) => (!collection.mentions(var)
                    && resolvable(collection, index, &resolved))
                .then(|| Source::Elements(collection.clone())),
                None => checks
                    .iter()
                    .filter_map(|t| derivation(t, var))
                    .find(|t| resolvable(t, index, &resolved))
                    .map(|t| Source::Derived(t.clone())),
            };
            if let Some(source) = source {
                sources[slot] = Some(source);
                resolved[slot] = true;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    sources
        .into_iter()
        .zip(vars)
        .map(|(source, var)| {
            source.ok_or_else(|| {
                Error::MalformedPattern(format!(
                    "variable `{}` has no domain and is not reachable from a bound variable",
                    var.name()
                ))
            })
        })
        .collect()
}

impl Plan {
    pub(crate) fn slot_of(&self, var: &Var) -> Option<usize> {
        self.index.get(var).copied()
    }

    /// The order in which slots are bound. Derived variables go as soon as
    /// their inputs are bound, then collection elements, then the domain
    /// variable picked by `order`.
    pub(crate) fn search_order(&self, order: SearchOrder) -> Vec<usize> {
        let n = self.vars.len();
        let mut placed = vec![false; n];
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            let ready = |slot: usize| !placed[slot] && self.deps[slot].iter().all(|&d| placed[d]);
            let derived =
                (0..n).find(|&s| ready(s) && matches!(self.sources[s], Source::Derived(_)));
            let next = derived
                .or_else(|| {
                    (0..n).find(|&s| ready(s) && matches!(self.sources[s], Source::Elements(_)))
                })
                .or_else(|| {
                    (0..n)
                        .filter(|&s| ready(s))
                        .filter_map(|s| match &self.sources[s] {
                            Source::Domain(domain) => Some((s, domain)),
                            _ => None,
                        })
                        .min_by_key(|(s, domain)| match order {
                            SearchOrder::Cardinality => (domain.len() as u64, *s as u64),
                            SearchOrder::Declaration => (self.vars[*s].id(), *s as u64),
                        })
                        .map(|(s, _)| s)
                });
            let Some(slot) = next else {
                break;
            };
            placed[slot] = true;
            out.push(slot);
        }
        out
    }

    /// For each search level, the conjuncts whose last variable binds there.
    pub(crate) fn level_checks(&self, order: &[usize]) -> Vec<Vec<usize>> {
        let mut level_of = vec![0; self.vars.len()];
        for (level, &slot) in order.iter().enumerate() {
            level_of[slot] = level;
        }
        let mut checks = vec![Vec::new(); order.len()];
        for (idx, conjunct) in self.conjuncts.iter().enumerate() {
            if let Some(level) = conjunct.slots.iter().map(|&s| level_of[s]).max() {
                checks[level].push(idx);
            }
        }
        checks
    }
}
