//! Building terms from ordinary Rust expressions.
//!
//! Every builder is symbolic: `fc.attr("parent").attr("name").equals("Container1")`
//! produces a [`Term`] tree and never touches a live object. Concrete
//! evaluation is a separate, explicit step ([`Term::evaluate`]) against a
//! set of [`Bindings`], so the two modes can never be confused.

use crate::error::Result;
use crate::evaluator;
use crate::term::{CompareOp, Term, Var};
use eql_api::{EntityType, Value};
use std::ops::{BitAnd, BitOr, Not};

/// Read access to the values currently bound to variables.
pub trait Bindings {
    fn lookup(&self, var: &Var) -> Option<&Value>;
}

impl Bindings for [(Var, Value)] {
    fn lookup(&self, var: &Var) -> Option<&Value> {
        self.iter().find(|(v, _)| v == var).map(|(_, value)| value)
    }
}

impl Bindings for Vec<(Var, Value)> {
    fn lookup(&self, var: &Var) -> Option<&Value> {
        self.as_slice().lookup(var)
    }
}

impl Var {
    pub fn attr(&self, name: impl Into<String>) -> Term {
        Term::var(self).attr(name)
    }

    pub fn equals(&self, rhs: impl Into<Term>) -> Term {
        Term::var(self).equals(rhs)
    }

    pub fn not_equals(&self, rhs: impl Into<Term>) -> Term {
        Term::var(self).not_equals(rhs)
    }

    pub fn is_a(&self, ty: &'static EntityType) -> Term {
        Term::var(self).is_a(ty)
    }

    pub fn is_in(&self, collection: impl Into<Term>) -> Term {
        Term::var(self).is_in(collection)
    }
}

impl Term {
    pub fn attr(self, name: impl Into<String>) -> Term {
        Term::AttributePath {
            base: Box::new(self),
            name: name.into(),
        }
    }

    pub fn compare(self, op: CompareOp, rhs: impl Into<Term>) -> Term {
        Term::Compare {
            op,
            left: Box::new(self),
            right: Box::new(rhs.into()),
        }
    }

    pub fn equals(self, rhs: impl Into<Term>) -> Term {
        self.compare(CompareOp::Eq, rhs)
    }

    pub fn not_equals(self, rhs: impl Into<Term>) -> Term {
        self.compare(CompareOp::Ne, rhs)
    }

    pub fn lt(self, rhs: impl Into<Term>) -> Term {
        self.compare(CompareOp::Lt, rhs)
    }

    pub fn le(self, rhs: impl Into<Term>) -> Term {
        self.compare(CompareOp::Le, rhs)
    }

    pub fn gt(self, rhs: impl Into<Term>) -> Term {
        self.compare(CompareOp::Gt, rhs)
    }

    pub fn ge(self, rhs: impl Into<Term>) -> Term {
        self.compare(CompareOp::Ge, rhs)
    }

    pub fn is_a(self, ty: &'static EntityType) -> Term {
        has_type(self, ty)
    }

    pub fn contains(self, element: impl Into<Term>) -> Term {
        contains(self, element)
    }

    pub fn is_in(self, collection: impl Into<Term>) -> Term {
        in_(self, collection)
    }

    /// Evaluates the term against concrete bindings.
    ///
    /// Errors with [`crate::Error::UnboundVariable`] when a variable the term
    /// needs is missing from `bindings`.
    pub fn evaluate(&self, bindings: &dyn Bindings) -> Result<Value> {
        evaluator::eval_value(self, bindings)
    }

    /// Evaluates the term as a condition.
    pub fn holds(&self, bindings: &dyn Bindings) -> Result<bool> {
        evaluator::eval_bool(self, bindings)
    }
}

pub fn and_(terms: impl IntoIterator<Item = Term>) -> Term {
    Term::conjunction(terms)
}

pub fn or_(terms: impl IntoIterator<Item = Term>) -> Term {
    Term::disjunction(terms)
}

pub fn not_(term: Term) -> Term {
    match term {
        Term::Not(inner) => *inner,
        other => Term::Not(Box::new(other)),
    }
}

pub fn contains(collection: impl Into<Term>, element: impl Into<Term>) -> Term {
    Term::Contains {
        collection: Box::new(collection.into()),
        element: Box::new(element.into()),
    }
}

/// `element in collection`; the same term as [`contains`] with the arguments swapped.
pub fn in_(element: impl Into<Term>, collection: impl Into<Term>) -> Term {
    contains(collection, element)
}

pub fn has_type(term: impl Into<Term>, ty: &'static EntityType) -> Term {
    Term::TypeTest {
        term: Box::new(term.into()),
        ty,
    }
}

pub fn exists(collection: impl Into<Term>, element: &Var, condition: Term) -> Term {
    Term::ExistsIn {
        collection: Box::new(collection.into()),
        element: element.clone(),
        condition: Box::new(condition),
    }
}

pub fn for_all(collection: impl Into<Term>, element: &Var, condition: Term) -> Term {
    Term::ForAll {
        collection: Box::new(collection.into()),
        element: element.clone(),
        condition: Box::new(condition),
    }
}

impl Not for Term {
    type Output = Term;

    fn not(self) -> Term {
        not_(self)
    }
}

impl BitAnd for Term {
    type Output = Term;

    fn bitand(self, rhs: Term) -> Term {
        Term::conjunction([self, rhs])
    }
}

impl BitOr for Term {
    type Output = Term;

    fn bitor(self, rhs: Term) -> Term {
        Term::disjunction([self, rhs])
    }
}

impl From<&Var> for Term {
    fn from(v: &Var) -> Self {
        Term::Var(v.clone())
    }
}

impl From<Var> for Term {
    fn from(v: Var) -> Self {
        Term::Var(v)
    }
}

macro_rules! literal_into_term {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Term {
                fn from(v: $ty) -> Self {
                    Term::Literal(Value::from(v))
                }
            }
        )*
    };
}

literal_into_term!(Value, bool, i64, i32, u32, f64, &str, String, Vec<Value>);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use eql_api::{AttributeDef, Entity};
    use std::sync::Arc;

    static PART: EntityType = EntityType::new(
        "Part",
        &[],
        &[AttributeDef::scalar("name"), AttributeDef::scalar("weight")],
    );

    #[derive(Debug)]
    struct Part {
        name: &'static str,
        weight: i64,
    }

    impl Entity for Part {
        fn entity_type(&self) -> &'static EntityType {
            &PART
        }

        fn attribute(&self, name: &str) -> Option<Value> {
            match name {
                "name" => Some(self.name.into()),
                "weight" => Some(self.weight.into()),
                _ => None,
            }
        }
    }

    fn part_var() -> Var {
        Var::new(&PART, None, Some("p"))
    }

    #[test]
    fn builders_produce_symbolic_trees() {
        let p = part_var();
        let t = p.attr("name").equals("bolt");
        assert_eq!(
            t,
            Term::Compare {
                op: CompareOp::Eq,
                left: Box::new(Term::AttributePath {
                    base: Box::new(Term::Var(p.clone())),
                    name: "name".into(),
                }),
                right: Box::new(Term::Literal(Value::from("bolt"))),
            }
        );
    }

    #[test]
    fn operators_flatten_and_double_negation_cancels() {
        let p = part_var();
        let a = p.attr("weight").gt(1);
        let b = p.attr("weight").lt(10);
        let c = p.attr("name").not_equals("nut");
        assert_eq!(
            a.clone() & b.clone() & c.clone(),
            Term::And(vec![a.clone(), b.clone(), c.clone()])
        );
        assert_eq!(a.clone() | b.clone(), Term::Or(vec![a.clone(), b]));
        assert_eq!(!!a.clone(), a);
        assert_eq!(in_("x", Value::List(vec![])), contains(Value::List(vec![]), "x"));
    }

    #[test]
    fn concrete_evaluation_reads_bound_values() {
        let p = part_var();
        let bolt: Value = Value::entity(Arc::new(Part {
            name: "bolt",
            weight: 3,
        }));
        let bindings = vec![(p.clone(), bolt)];
        assert_eq!(p.attr("name").evaluate(&bindings).unwrap(), Value::from("bolt"));
        assert!(p.attr("weight").ge(3).holds(&bindings).unwrap());
        assert!(!p.attr("weight").gt(3).holds(&bindings).unwrap());
        assert!(
            p.attr("name")
                .is_in(vec![Value::from("nut"), Value::from("bolt")])
                .holds(&bindings)
                .unwrap()
        );
    }

    #[test]
    fn concrete_evaluation_without_binding_fails() {
        let p = part_var();
        let empty: Vec<(Var, Value)> = Vec::new();
        let err = p.attr("name").evaluate(&empty).unwrap_err();
        assert!(matches!(err, Error::UnboundVariable(name) if name == "p"));
    }
}
