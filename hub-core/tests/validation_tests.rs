//! Load-time invariant tests for `hub-core`.
//!
//! Each `#[case]` is isolated; no shared state.

use hub_core::{
    load, EntityKind, Member, RawDescription, RawGroup, RawUnit, SourcePosition, ValidationIssue,
};
use rstest::rstest;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn description(units: Vec<RawUnit>, groups: Vec<RawGroup>) -> RawDescription {
    RawDescription {
        units,
        groups,
        ..RawDescription::default()
    }
}

fn issues_of(raw: &RawDescription) -> Vec<ValidationIssue> {
    load(raw).expect_err("expected a validation error").into_issues()
}

// ---------------------------------------------------------------------------
// 1. Namespace uniqueness
// ---------------------------------------------------------------------------

#[rstest]
#[case::unit_unit(
    vec![RawUnit::generic("scout"), RawUnit::generic("scout")],
    vec![],
    SourcePosition::unit(0),
    SourcePosition::unit(1)
)]
#[case::group_group(
    vec![RawUnit::generic("a")],
    vec![RawGroup::new("crew", &["a"]), RawGroup::new("crew", &["a"])],
    SourcePosition::group(0),
    SourcePosition::group(1)
)]
#[case::unit_group(
    vec![RawUnit::generic("a"), RawUnit::generic("crew")],
    vec![RawGroup::new("crew", &["a"])],
    SourcePosition::unit(1),
    SourcePosition::group(0)
)]
fn duplicate_names_are_rejected(
    #[case] units: Vec<RawUnit>,
    #[case] groups: Vec<RawGroup>,
    #[case] first: SourcePosition,
    #[case] second: SourcePosition,
) {
    let issues = issues_of(&description(units, groups));
    assert!(
        issues.iter().any(|issue| matches!(
            issue,
            ValidationIssue::DuplicateName { first: f, second: s, .. } if *f == first && *s == second
        )),
        "got: {issues:?}"
    );
}

// ---------------------------------------------------------------------------
// 2. Endpoint collisions
// ---------------------------------------------------------------------------

#[test]
fn shared_endpoint_is_rejected_before_anything_starts() {
    let raw = description(
        vec![
            RawUnit::capability("a", "prospectfinder", 8001),
            RawUnit::capability("c", "xtwitter", 8001),
        ],
        vec![],
    );
    let issues = issues_of(&raw);
    assert_eq!(
        issues,
        vec![ValidationIssue::EndpointConflict {
            host: "localhost".into(),
            port: 8001,
            units: vec!["a".into(), "c".into()],
        }]
    );
}

#[test]
fn generic_units_never_conflict() {
    let raw = description(
        vec![RawUnit::generic("a"), RawUnit::generic("b")],
        vec![RawGroup::new("pair", &["a", "b"])],
    );
    assert!(load(&raw).is_ok());
}

// ---------------------------------------------------------------------------
// 3. Group references
// ---------------------------------------------------------------------------

#[test]
fn unknown_member_is_unresolved_reference() {
    let raw = description(
        vec![RawUnit::generic("a")],
        vec![RawGroup::new("team", &["a", "nobody"])],
    );
    assert_eq!(
        issues_of(&raw),
        vec![ValidationIssue::UnresolvedReference {
            group: "team".into(),
            member: "nobody".into(),
        }]
    );
}

#[test]
fn two_group_cycle_names_both_members() {
    let raw = description(
        vec![RawUnit::generic("u")],
        vec![RawGroup::new("A", &["B"]), RawGroup::new("B", &["A", "u"])],
    );
    let issues = issues_of(&raw);
    let cycle = issues
        .iter()
        .find_map(|issue| match issue {
            ValidationIssue::CyclicGroup { cycle } => Some(cycle.clone()),
            _ => None,
        })
        .expect("cyclic group issue");
    assert!(cycle.contains(&"A".to_string()));
    assert!(cycle.contains(&"B".to_string()));
    assert_eq!(cycle.first(), cycle.last(), "cycle path is closed");
}

#[test]
fn forward_references_to_groups_resolve() {
    let raw = description(
        vec![RawUnit::generic("u")],
        vec![RawGroup::new("outer", &["inner"]), RawGroup::new("inner", &["u"])],
    );
    let config = load(&raw).expect("valid");
    let members = config.members("outer").expect("group");
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].kind(), EntityKind::Group);
}

// ---------------------------------------------------------------------------
// 4. Happy path scenario
// ---------------------------------------------------------------------------

#[test]
fn team_members_resolve_in_declared_order() {
    let raw = description(
        vec![
            RawUnit::capability("a", "prospectfinder", 8001),
            RawUnit::capability("b", "xtwitter", 8002),
        ],
        vec![RawGroup::new("team", &["a", "b"])],
    );
    let config = load(&raw).expect("valid");

    let names: Vec<String> = config
        .members("team")
        .expect("team exists")
        .iter()
        .map(|m| m.name().to_string())
        .collect();
    assert_eq!(names, vec!["a", "b"]);

    assert!(config
        .members("team")
        .expect("team exists")
        .iter()
        .all(|m| matches!(m, Member::Unit(_))));
    assert_eq!(config.process_units().count(), 2);
}

#[test]
fn error_message_summarizes_every_issue() {
    let raw = description(
        vec![
            RawUnit::capability("a", "search", 8001),
            RawUnit::capability("c", "search", 8001),
        ],
        vec![RawGroup::new("team", &["ghost"])],
    );
    let msg = load(&raw).unwrap_err().to_string();
    assert!(msg.contains("2 issues"), "{msg}");
    assert!(msg.contains("localhost:8001"), "{msg}");
    assert!(msg.contains("ghost"), "{msg}");
}
