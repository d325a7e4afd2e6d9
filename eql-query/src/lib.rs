pub mod capture;
pub mod error;
pub mod evaluator;
pub mod options;
pub mod pattern;
mod planner;
pub mod quantifier;
pub mod query;
mod render;
pub mod term;

pub use capture::{Bindings, and_, contains, exists, for_all, has_type, in_, not_, or_};
pub use eql_api::{AttributeDef, Domain, DomainSource, Entity, EntityRef, EntityType, Value};
pub use error::{Error, Result};
pub use evaluator::{Solution, Solutions};
pub use options::{EvalOptions, SearchOrder};
pub use pattern::{
    CompiledPattern, EntityMatch, Pattern, PatternValue, entity_matching, match_, match_any,
    select, select_any,
};
pub use quantifier::{
    An, Answer, Quantification, Results, The, a, an, at_least, at_most, between, exactly, the,
};
pub use query::{IntoQuery, QuerySpec, entity, let_, let_named, set_of, var};
pub use term::{CompareOp, Term, Var};
