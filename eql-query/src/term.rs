//! Symbolic terms: variables, attribute paths, comparisons and connectives.
//!
//! Terms are plain immutable trees. They are built with the methods in
//! [`crate::capture`], compiled from patterns in [`crate::pattern`], and
//! evaluated by [`crate::evaluator`].

use eql_api::{Domain, EntityType, Value};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_VAR_ID: AtomicU64 = AtomicU64::new(1);

/// A logic variable ranging over instances of one entity type.
///
/// Identity is the allocation: cloning a `Var` yields the same variable,
/// two calls to [`crate::query::let_`] never do, even with equal names.
#[derive(Clone)]
pub struct Var {
    inner: Arc<VarInner>,
}

struct VarInner {
    id: u64,
    name: String,
    ty: &'static EntityType,
    domain: Option<Domain>,
}

impl Var {
    pub(crate) fn new(ty: &'static EntityType, domain: Option<Domain>, name: Option<&str>) -> Self {
        Self {
            inner: Arc::new(VarInner {
                id: NEXT_VAR_ID.fetch_add(1, Ordering::Relaxed),
                name: name.unwrap_or(ty.name).to_string(),
                ty,
                domain,
            }),
        }
    }

    /// Process-unique, monotonically increasing creation number.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn entity_type(&self) -> &'static EntityType {
        self.inner.ty
    }

    /// The explicit domain, if one was given at declaration.
    pub fn domain(&self) -> Option<&Domain> {
        self.inner.domain.as_ref()
    }
}

impl PartialEq for Var {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Var {}

impl Hash for Var {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Var({}#{}: {})", self.inner.name, self.inner.id, self.inner.ty.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Literal(Value),
    Var(Var),
    AttributePath {
        base: Box<Term>,
        name: String,
    },
    Compare {
        op: CompareOp,
        left: Box<Term>,
        right: Box<Term>,
    },
    /// Exact-or-subtype test on the runtime type of `term`.
    TypeTest {
        term: Box<Term>,
        ty: &'static EntityType,
    },
    Contains {
        collection: Box<Term>,
        element: Box<Term>,
    },
    /// The empty conjunction is true.
    And(Vec<Term>),
    /// The empty disjunction is false.
    Or(Vec<Term>),
    Not(Box<Term>),
    /// Some member of `collection`, bound to `element`, satisfies `condition`.
    ExistsIn {
        collection: Box<Term>,
        element: Var,
        condition: Box<Term>,
    },
    /// Every member of `collection` that is an instance of the element's
    /// type satisfies `condition`.
    ForAll {
        collection: Box<Term>,
        element: Var,
        condition: Box<Term>,
    },
}

impl Term {
    pub fn literal(value: impl Into<Value>) -> Term {
        Term::Literal(value.into())
    }

    pub fn var(var: &Var) -> Term {
        Term::Var(var.clone())
    }

    /// Conjunction with nested `And`s spliced in; a single term stays as is.
    pub fn conjunction(terms: impl IntoIterator<Item = Term>) -> Term {
        let mut flat = Vec::new();
        for term in terms {
            match term {
                Term::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.pop().unwrap_or(Term::And(Vec::new()))
        } else {
            Term::And(flat)
        }
    }

    /// Disjunction with nested `Or`s spliced in; a single term stays as is.
    pub fn disjunction(terms: impl IntoIterator<Item = Term>) -> Term {
        let mut flat = Vec::new();
        for term in terms {
            match term {
                Term::Or(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.pop().unwrap_or(Term::Or(Vec::new()))
        } else {
            Term::Or(flat)
        }
    }

    pub fn as_var(&self) -> Option<&Var> {
        match self {
            Term::Var(v) => Some(v),
            _ => None,
        }
    }

    /// Variables that must be bound for this term to evaluate, in first
    /// appearance order. Element variables of `ExistsIn`/`ForAll` are bound
    /// by the term itself and only count when they appear outside it.
    pub fn free_vars(&self) -> Vec<Var> {
        let mut out = Vec::new();
        let mut scoped = Vec::new();
        self.collect_free_vars(&mut scoped, &mut out);
        out
    }

    pub fn mentions(&self, var: &Var) -> bool {
        self.free_vars().contains(var)
    }

    fn collect_free_vars(&self, scoped: &mut Vec<Var>, out: &mut Vec<Var>) {
        match self {
            Term::Literal(_) => {}
            Term::Var(v) => {
                if !scoped.contains(v) && !out.contains(v) {
                    out.push(v.clone());
                }
            }
            Term::AttributePath { base, .. } => base.collect_free_vars(scoped, out),
            Term::Compare { left, right, .. } => {
                left.collect_free_vars(scoped, out);
                right.collect_free_vars(scoped, out);
            }
            Term::TypeTest { term, .. } | Term::Not(term) => term.collect_free_vars(scoped, out),
            Term::Contains {
                collection,
                element,
            } => {
                collection.collect_free_vars(scoped, out);
                element.collect_free_vars(scoped, out);
            }
            Term::And(terms) | Term::Or(terms) => {
                for t in terms {
                    t.collect_free_vars(scoped, out);
                }
            }
            Term::ExistsIn {
                collection,
                element,
                condition,
            }
            | Term::ForAll {
                collection,
                element,
                condition,
            } => {
                collection.collect_free_vars(scoped, out);
                scoped.push(element.clone());
                condition.collect_free_vars(scoped, out);
                scoped.pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eql_api::AttributeDef;

    static BOX: EntityType = EntityType::new("Box", &[], &[AttributeDef::collection("items")]);

    #[test]
    fn vars_are_distinct_even_with_equal_names() {
        let a = Var::new(&BOX, None, Some("b"));
        let b = Var::new(&BOX, None, Some("b"));
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert!(b.id() > a.id());
        assert_eq!(Var::new(&BOX, None, None).name(), "Box");
    }

    #[test]
    fn conjunction_splices_nested_ands() {
        let x = Term::literal(true);
        let nested = Term::conjunction([x.clone(), Term::And(vec![x.clone(), x.clone()])]);
        assert_eq!(nested, Term::And(vec![x.clone(), x.clone(), x.clone()]));
        assert_eq!(Term::conjunction([x.clone()]), x);
        assert_eq!(Term::conjunction(Vec::new()), Term::And(vec![]));
    }

    #[test]
    fn free_vars_skip_scoped_elements() {
        let b = Var::new(&BOX, None, Some("b"));
        let e = Var::new(&BOX, None, Some("e"));
        let t = Term::ExistsIn {
            collection: Box::new(Term::AttributePath {
                base: Box::new(Term::var(&b)),
                name: "items".into(),
            }),
            element: e.clone(),
            condition: Box::new(Term::Compare {
                op: CompareOp::Eq,
                left: Box::new(Term::var(&e)),
                right: Box::new(Term::var(&b)),
            }),
        };
        assert_eq!(t.free_vars(), vec![b.clone()]);
        assert!(!t.mentions(&e));
    }
}
