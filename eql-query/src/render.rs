use crate::planner::{Plan, Source};
use crate::term::Term;
use std::fmt::{self, Write as _};

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Literal(v) => write!(f, "{v}"),
            Term::Var(v) => f.write_str(v.name()),
            Term::AttributePath { base, name } => write!(f, "{base}.{name}"),
            Term::Compare { op, left, right } => write!(f, "{left} {op} {right}"),
            Term::TypeTest { term, ty } => write!(f, "{term} is {}", ty.name),
            Term::Contains {
                collection,
                element,
            } => write!(f, "{element} in {collection}"),
            Term::And(terms) if terms.is_empty() => f.write_str("true"),
            Term::Or(terms) if terms.is_empty() => f.write_str("false"),
            Term::And(terms) => write_joined(f, terms, " and "),
            Term::Or(terms) => write_joined(f, terms, " or "),
            Term::Not(inner) => write!(f, "not {inner}"),
            Term::ExistsIn {
                collection,
                element,
                condition,
            } => write!(
                f,
                "any {}: {} in {collection} where {condition}",
                element.name(),
                element.entity_type().name
            ),
            Term::ForAll {
                collection,
                element,
                condition,
            } => write!(
                f,
                "all {}: {} in {collection} where {condition}",
                element.name(),
                element.entity_type().name
            ),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, terms: &[Term], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, t) in terms.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{t}")?;
    }
    f.write_str(")")
}

pub(crate) fn explain(plan: &Plan, constraint: &Term) -> String {
    let mut out = String::new();
    let outputs: Vec<&str> = plan.outputs.iter().map(|&s| plan.vars[s].name()).collect();
    let _ = writeln!(out, "Select({})", outputs.join(", "));
    for (var, source) in plan.vars.iter().zip(&plan.sources) {
        let from = match source {
            Source::Domain(domain) => format!("domain(len={})", domain.len()),
            Source::Derived(term) => format!("derived({term})"),
            Source::Elements(term) => format!("elements({term})"),
        };
        let _ = writeln!(
            out,
            "  Var(name={}, type={}, from={from})",
            var.name(),
            var.entity_type().name
        );
    }
    let _ = writeln!(out, "Where");
    render_term(&mut out, constraint, 1);
    out
}

fn render_term(out: &mut String, term: &Term, depth: usize) {
    let pad = "  ".repeat(depth);
    match term {
        Term::And(terms) if !terms.is_empty() => {
            let _ = writeln!(out, "{pad}And");
            for t in terms {
                render_term(out, t, depth + 1);
            }
        }
        Term::Or(terms) if !terms.is_empty() => {
            let _ = writeln!(out, "{pad}Or");
            for t in terms {
                render_term(out, t, depth + 1);
            }
        }
        Term::Not(inner) => {
            let _ = writeln!(out, "{pad}Not");
            render_term(out, inner, depth + 1);
        }
        Term::ExistsIn {
            collection,
            element,
            condition,
        } => {
            let _ = writeln!(out, "{pad}Exists({} in {collection})", element.name());
            render_term(out, condition, depth + 1);
        }
        Term::ForAll {
            collection,
            element,
            condition,
        } => {
            let _ = writeln!(out, "{pad}ForAll({} in {collection})", element.name());
            render_term(out, condition, depth + 1);
        }
        leaf => {
            let _ = writeln!(out, "{pad}{leaf}");
        }
    }
}
