mod common;

use common::*;
use eql_query::{
    Answer, Domain, Error, a, an, at_least, at_most, between, entity_matching, exactly, let_,
    let_named, match_, set_of, the,
};

fn by_parent(w: &World, parent: &str) -> eql_query::EntityMatch {
    entity_matching(&FIXED_CONNECTION, Domain::from_entities(w.connections.clone()))
        .with("parent", match_(&CONTAINER).with("name", parent))
        .with("child", match_(&HANDLE).with("name", "H1"))
}

#[test]
fn the_fails_without_a_match() {
    let w = world();
    let err = the(by_parent(&w, "C9")).unwrap().evaluate().unwrap_err();
    assert!(matches!(err, Error::NoMatch));
}

#[test]
fn the_fails_on_ambiguity() {
    let w = world();
    let query = entity_matching(&FIXED_CONNECTION, Domain::from_entities(w.connections.clone()))
        .with("child", match_(&HANDLE).with("name", "H1"));
    let err = the(query).unwrap().evaluate().unwrap_err();
    assert!(matches!(err, Error::MultipleMatches));
}

#[test]
fn the_agrees_with_an() {
    let w = world();
    for parent in ["C1", "CX", "C9"] {
        let all = an(by_parent(&w, parent)).unwrap().values().unwrap();
        match the(by_parent(&w, parent)).unwrap().evaluate() {
            Ok(Answer::Value(v)) => {
                assert_eq!(all.len(), 1);
                assert_eq!(all[0], v);
            }
            Ok(other) => panic!("unexpected answer {other:?}"),
            Err(Error::NoMatch) => assert!(all.is_empty()),
            Err(Error::MultipleMatches) => assert!(all.len() > 1),
            Err(e) => panic!("unexpected error {e}"),
        }
    }
}

#[test]
fn search_does_not_start_before_the_first_pull() {
    let w = world();
    let query = by_parent(&w, "CX").build().unwrap();
    let mut solutions = query.solutions();
    assert_eq!(solutions.steps(), 0);

    let first = solutions.next().unwrap().unwrap();
    assert!(is(&first.columns()[0].1, &w.connections[1]));
    assert!(solutions.steps() > 0);
    assert!(solutions.next().is_none());
    // exhausted stays exhausted
    assert!(solutions.next().is_none());
}

#[test]
fn abandoning_iteration_early_is_fine() {
    let w = world();
    let all = entity_matching(&FIXED_CONNECTION, Domain::from_entities(w.connections.clone()));
    let first: Vec<_> = an(all).unwrap().evaluate().take(1).collect();
    assert_eq!(first.len(), 1);
    assert!(first[0].is_ok());
}

#[test]
fn a_is_an() {
    let w = world();
    let x = a(by_parent(&w, "C1")).unwrap().values().unwrap();
    let y = an(by_parent(&w, "C1")).unwrap().values().unwrap();
    assert_eq!(x, y);
}

#[test]
fn quantification_bounds_are_enforced() {
    let w = world();
    let both = || entity_matching(&FIXED_CONNECTION, Domain::from_entities(w.connections.clone()));

    assert_eq!(an(both()).unwrap().quantified(exactly(2)).to_vec().unwrap().len(), 2);
    assert_eq!(an(both()).unwrap().quantified(between(1, 2)).to_vec().unwrap().len(), 2);
    assert_eq!(an(both()).unwrap().quantified(at_least(2)).to_vec().unwrap().len(), 2);

    let err = an(both()).unwrap().quantified(exactly(1)).to_vec().unwrap_err();
    assert!(matches!(err, Error::QuantificationViolated { found: 2, .. }));

    let err = an(both()).unwrap().quantified(at_least(3)).to_vec().unwrap_err();
    assert!(matches!(err, Error::QuantificationViolated { found: 2, .. }));
    assert_eq!(err.to_string(), "expected at least 3 solutions, got 2");
}

#[test]
fn at_most_fails_as_soon_as_exceeded() {
    let w = world();
    let both = entity_matching(&FIXED_CONNECTION, Domain::from_entities(w.connections.clone()));
    let mut results = an(both).unwrap().quantified(at_most(1)).evaluate();
    assert!(results.next().unwrap().is_ok());
    assert!(matches!(
        results.next(),
        Some(Err(Error::QuantificationViolated { found: 2, .. }))
    ));
    assert!(results.next().is_none());
}

#[test]
fn set_of_answers_with_bindings() {
    let w = world();
    let fc = let_(&FIXED_CONNECTION, Domain::from_entities(w.connections.clone()));
    let c = let_named(
        &CONTAINER,
        Domain::from_entities(vec![w.c1.clone(), w.cx.clone()]),
        "c",
    );
    let query = set_of(
        [&fc, &c],
        [fc.attr("parent").equals(&c), c.attr("name").equals("CX")],
    );

    let answer = the(query).unwrap().evaluate().unwrap();
    let solution = answer.solution().expect("two outputs");
    assert_eq!(solution.len(), 2);
    assert!(is(solution.value(&fc).unwrap(), &w.connections[1]));
    assert!(is(solution.value(&c).unwrap(), &w.cx));
    assert!(is(solution.by_name("c").unwrap(), &w.cx));
}
