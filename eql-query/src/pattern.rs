//! Declarative structural patterns and their compilation into terms.
//!
//! ```ignore
//! let q = entity_matching(&FIXED_CONNECTION, connections)
//!     .with("parent", match_(&CONTAINER).with("name", "Container1"))
//!     .with("child", match_(&HANDLE).with("name", "Handle1"))
//!     .build()?;
//! ```
//!
//! compiles to the same constraint as the hand-written
//!
//! ```ignore
//! let fc = let_(&FIXED_CONNECTION, connections);
//! entity(&fc, [
//!     fc.attr("parent").is_a(&CONTAINER),
//!     fc.attr("parent").attr("name").equals("Container1"),
//!     fc.attr("child").is_a(&HANDLE),
//!     fc.attr("child").attr("name").equals("Handle1"),
//! ])
//! ```

use crate::error::{Error, Result};
use crate::query::QuerySpec;
use crate::term::{Term, Var};
use eql_api::{Domain, EntityType, Value};

/// Right-hand side of a pattern attribute.
#[derive(Debug, Clone)]
pub enum PatternValue {
    Term(Term),
    Pattern(Box<Pattern>),
}

impl From<Pattern> for PatternValue {
    fn from(p: Pattern) -> Self {
        PatternValue::Pattern(Box::new(p))
    }
}

impl From<Term> for PatternValue {
    fn from(t: Term) -> Self {
        PatternValue::Term(t)
    }
}

impl From<&Var> for PatternValue {
    fn from(v: &Var) -> Self {
        PatternValue::Term(Term::var(v))
    }
}

macro_rules! literal_into_pattern_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for PatternValue {
                fn from(v: $ty) -> Self {
                    PatternValue::Term(Term::Literal(Value::from(v)))
                }
            }
        )*
    };
}

literal_into_pattern_value!(Value, bool, i64, i32, u32, f64, &str, String, Vec<Value>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Match,
    Select,
    MatchAny,
    SelectAny,
}

impl Mode {
    fn selected(self) -> bool {
        matches!(self, Mode::Select | Mode::SelectAny)
    }

    fn existential(self) -> bool {
        matches!(self, Mode::MatchAny | Mode::SelectAny)
    }

    fn label(self) -> &'static str {
        match self {
            Mode::Match => "match",
            Mode::Select => "select",
            Mode::MatchAny => "match_any",
            Mode::SelectAny => "select_any",
        }
    }
}

/// A structural description of an entity: its type plus expected
/// attribute values, possibly nested.
#[derive(Debug, Clone)]
pub struct Pattern {
    ty: &'static EntityType,
    mode: Mode,
    attrs: Vec<(String, PatternValue)>,
}

pub fn match_(ty: &'static EntityType) -> Pattern {
    Pattern::new(ty, Mode::Match)
}

/// Like [`match_`], and the matched entity becomes an output of the query.
pub fn select(ty: &'static EntityType) -> Pattern {
    Pattern::new(ty, Mode::Select)
}

/// Matches when at least one element of a collection attribute fits.
pub fn match_any(ty: &'static EntityType) -> Pattern {
    Pattern::new(ty, Mode::MatchAny)
}

/// Like [`match_any`], and each fitting element becomes an output.
pub fn select_any(ty: &'static EntityType) -> Pattern {
    Pattern::new(ty, Mode::SelectAny)
}

impl Pattern {
    fn new(ty: &'static EntityType, mode: Mode) -> Self {
        Self {
            ty,
            mode,
            attrs: Vec::new(),
        }
    }

    /// Adds an expected attribute value. Later entries for the same name
    /// add constraints; they do not replace earlier ones.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PatternValue>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn entity_type(&self) -> &'static EntityType {
        self.ty
    }

    pub fn is_selected(&self) -> bool {
        self.mode.selected()
    }

    pub fn is_existential(&self) -> bool {
        self.mode.existential()
    }

    /// Compiles the pattern against the entity denoted by `at`.
    pub fn compile_at(&self, at: impl Into<Term>) -> Result<CompiledPattern> {
        let mut ctx = CompileContext::default();
        let constraint = ctx.compile_value(self, at.into(), false)?;
        Ok(CompiledPattern {
            constraint,
            selected: ctx.selected,
        })
    }
}

/// Output of [`Pattern::compile_at`].
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub constraint: Term,
    /// Variables registered by `select`/`select_any`, in pattern order.
    pub selected: Vec<Var>,
}

struct Frame {
    ty: &'static EntityType,
}

/// Compilation state: the stack of enclosing patterns and the outputs
/// registered so far.
#[derive(Default)]
struct CompileContext {
    frames: Vec<Frame>,
    selected: Vec<Var>,
}

impl CompileContext {
    /// Runs `f` with `frame` pushed; the frame is popped on every exit path.
    fn scoped<T>(&mut self, frame: Frame, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.frames.push(frame);
        let result = f(self);
        self.frames.pop();
        result
    }

    fn path(&self) -> String {
        self.frames
            .iter()
            .map(|frame| frame.ty.name)
            .collect::<Vec<_>>()
            .join(" > ")
    }

    fn malformed(&self, msg: String) -> Error {
        if self.frames.is_empty() {
            Error::MalformedPattern(msg)
        } else {
            Error::MalformedPattern(format!("{msg} (in {})", self.path()))
        }
    }

    /// Compiles `pattern` standing for the value at `at`, honoring its mode.
    /// `collection` tells whether `at` holds a collection; an existential
    /// pattern always ranges over the members of `at`.
    fn compile_value(&mut self, pattern: &Pattern, at: Term, collection: bool) -> Result<Term> {
        if pattern.mode.existential() || collection {
            let element = Var::new(pattern.ty, None, None);
            if pattern.mode.selected() {
                self.selected.push(element.clone());
            }
            let condition = self.compile_body(pattern, Term::var(&element))?;
            return Ok(Term::ExistsIn {
                collection: Box::new(at),
                element,
                condition: Box::new(condition),
            });
        }

        if pattern.mode.selected() {
            if let Term::Var(var) = &at {
                self.selected.push(var.clone());
                return self.compile_body(pattern, at);
            }
            let var = Var::new(pattern.ty, None, None);
            self.selected.push(var.clone());
            let body = self.compile_body(pattern, Term::var(&var))?;
            return Ok(Term::conjunction([at.equals(&var), body]));
        }

        self.compile_body(pattern, at)
    }

    /// Type test on `at` plus one constraint per attribute entry.
    fn compile_body(&mut self, pattern: &Pattern, at: Term) -> Result<Term> {
        self.scoped(Frame { ty: pattern.ty }, |ctx| {
            let mut parts = vec![at.clone().is_a(pattern.ty)];
            for (name, value) in &pattern.attrs {
                let def = pattern.ty.attribute(name);
                let is_collection = def.is_some_and(|d| d.collection);
                let path = at.clone().attr(name.as_str());
                let part = match value {
                    PatternValue::Pattern(child) => {
                        if child.mode.existential() && def.is_some_and(|d| !d.collection) {
                            return Err(ctx.malformed(format!(
                                "{}({}) needs a collection attribute, `{}.{name}` is scalar",
                                child.mode.label(),
                                child.ty.name,
                                pattern.ty.name
                            )));
                        }
                        ctx.compile_value(child, path, is_collection)?
                    }
                    PatternValue::Term(term) => {
                        let is_list = matches!(term, Term::Literal(Value::List(_)));
                        if is_collection && !is_list {
                            path.contains(term.clone())
                        } else if def.is_some() && !is_collection && is_list {
                            path.is_in(term.clone())
                        } else {
                            path.equals(term.clone())
                        }
                    }
                };
                parts.push(part);
            }
            Ok(Term::conjunction(parts))
        })
    }
}

/// Declares a fresh variable over `domain` and matches it against a pattern.
///
/// Without nested `select`s the query yields the matched entities; with
/// them, solutions bind the root variable and every selected variable.
pub fn entity_matching(ty: &'static EntityType, domain: impl Into<Domain>) -> EntityMatch {
    EntityMatch {
        pattern: match_(ty),
        domain: domain.into(),
        name: None,
    }
}

#[derive(Debug, Clone)]
pub struct EntityMatch {
    pattern: Pattern,
    domain: Domain,
    name: Option<String>,
}

impl EntityMatch {
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PatternValue>) -> Self {
        self.pattern = self.pattern.with(name, value);
        self
    }

    /// Names the root variable (defaults to the type name).
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn build(self) -> Result<QuerySpec> {
        let root = Var::new(self.pattern.ty, Some(self.domain), self.name.as_deref());
        let mut ctx = CompileContext::default();
        let constraint = ctx.compile_body(&self.pattern, Term::var(&root))?;
        let mut outputs = vec![root];
        outputs.extend(ctx.selected);
        QuerySpec::new(outputs, constraint)
    }
}
