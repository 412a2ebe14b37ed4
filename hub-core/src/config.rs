//! Configuration loading and validation.
//!
//! [`load`] turns a [`RawDescription`] into a [`Configuration`] or a single
//! [`ValidationError`] listing every violated invariant. It performs no I/O.
//!
//! # Passes
//!
//! 1. Namespace: every unit and group name goes into one map keyed by name;
//!    the first collision on a name reports both source positions.
//! 2. Units: endpoint presence must match `capability_type`; capability units
//!    are then bucketed by `(host, port)` to catch shared endpoints.
//! 3. Groups: every member must exist in the namespace (forward references
//!    are fine), and group→group edges must be acyclic.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use crate::error::{ValidationError, ValidationIssue};
use crate::raw::{RawDescription, RawGroup, RawUnit};
use crate::settings::Settings;
use crate::types::{
    Defaults, Endpoint, EntityKind, EntityName, Group, Member, Overrides, SourcePosition, Unit,
    UnitFlags,
};

/// The validated, immutable root aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    units: IndexMap<EntityName, Unit>,
    groups: IndexMap<EntityName, Group>,
    defaults: Defaults,
}

/// Validate `raw` using built-in defaults only.
pub fn load(raw: &RawDescription) -> Result<Configuration, ValidationError> {
    load_with_settings(raw, &Settings::default())
}

/// Validate `raw`; defaults it leaves out are taken from `settings` first.
pub fn load_with_settings(
    raw: &RawDescription,
    settings: &Settings,
) -> Result<Configuration, ValidationError> {
    let mut issues = Vec::new();
    let defaults = Defaults::resolve(&raw.defaults, settings, &mut issues);

    if raw.units.is_empty() && raw.groups.is_empty() {
        issues.push(ValidationIssue::EmptyConfiguration);
    }

    let namespace = build_namespace(raw, &mut issues);

    let mut units = IndexMap::new();
    for raw_unit in &raw.units {
        let unit = build_unit(raw_unit, &defaults, &mut issues);
        // First declaration wins; the duplicate was already reported.
        units.entry(unit.name.clone()).or_insert(unit);
    }
    check_endpoints(&units, &mut issues);

    let mut groups = IndexMap::new();
    for raw_group in &raw.groups {
        let group = build_group(raw_group, &namespace, &mut issues);
        groups.entry(group.name.clone()).or_insert(group);
    }
    check_cycles(&groups, &namespace, &mut issues);

    if !issues.is_empty() {
        return Err(ValidationError::new(issues));
    }

    Ok(Configuration {
        units,
        groups,
        defaults,
    })
}

impl Configuration {
    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    /// Units in declaration order.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    /// Groups in declaration order.
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn unit(&self, name: &str) -> Option<&Unit> {
        self.units.get(name)
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    /// Units that need a dedicated capability server.
    pub fn process_units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values().filter(|u| u.requires_process())
    }

    pub fn lookup(&self, name: &str) -> Option<Member<'_>> {
        self.units
            .get(name)
            .map(Member::Unit)
            .or_else(|| self.groups.get(name).map(Member::Group))
    }

    /// Direct members of `group`, in declared order.
    pub fn members(&self, group: &str) -> Option<Vec<Member<'_>>> {
        let group = self.groups.get(group)?;
        // Every reference resolved at load time.
        Some(
            group
                .member_refs
                .iter()
                .filter_map(|name| self.lookup(name.as_str()))
                .collect(),
        )
    }

    /// Leaf units reachable from `group`, depth-first, each listed once.
    pub fn member_units(&self, group: &str) -> Option<Vec<&Unit>> {
        let group = self.groups.get(group)?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.collect_units(group, &mut seen, &mut out);
        Some(out)
    }

    fn collect_units<'a>(
        &'a self,
        group: &'a Group,
        seen: &mut HashSet<&'a str>,
        out: &mut Vec<&'a Unit>,
    ) {
        for name in &group.member_refs {
            match self.lookup(name.as_str()) {
                Some(Member::Unit(unit)) => {
                    if seen.insert(unit.name.as_str()) {
                        out.push(unit);
                    }
                }
                Some(Member::Group(inner)) => self.collect_units(inner, seen, out),
                None => {}
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Passes
// ---------------------------------------------------------------------------

fn build_namespace<'a>(
    raw: &'a RawDescription,
    issues: &mut Vec<ValidationIssue>,
) -> HashMap<&'a str, SourcePosition> {
    let entries = raw
        .units
        .iter()
        .enumerate()
        .map(|(i, u)| (u.name.as_str(), SourcePosition::unit(i)))
        .chain(
            raw.groups
                .iter()
                .enumerate()
                .map(|(i, g)| (g.name.as_str(), SourcePosition::group(i))),
        );

    let mut namespace = HashMap::new();
    for (name, position) in entries {
        if name.trim().is_empty() {
            issues.push(ValidationIssue::EmptyName { position });
            continue;
        }
        match namespace.get(name) {
            Some(first) => issues.push(ValidationIssue::DuplicateName {
                name: name.to_string(),
                first: *first,
                second: position,
            }),
            None => {
                namespace.insert(name, position);
            }
        }
    }
    namespace
}

fn build_unit(raw: &RawUnit, defaults: &Defaults, issues: &mut Vec<ValidationIssue>) -> Unit {
    let endpoint = match (&raw.capability_type, raw.port) {
        (Some(_), Some(port)) => Some(Endpoint::new(
            raw.host.clone().unwrap_or_else(|| defaults.host.clone()),
            port,
        )),
        (Some(_), None) => {
            issues.push(ValidationIssue::MissingEndpoint {
                unit: raw.name.clone(),
            });
            None
        }
        (None, Some(_)) => {
            issues.push(ValidationIssue::UnexpectedEndpoint {
                unit: raw.name.clone(),
            });
            None
        }
        (None, None) => None,
    };

    let flag_defaults = UnitFlags::default();
    Unit {
        name: EntityName::from(raw.name.clone()),
        description: raw.description.clone(),
        capability_type: raw.capability_type.clone(),
        endpoint,
        directives: raw.directives.clone(),
        overrides: Overrides {
            model: raw.model.clone(),
            timeout_secs: raw.timeout_secs,
            history: raw.history.clone(),
        },
        flags: UnitFlags {
            markdown: raw.markdown.unwrap_or(flag_defaults.markdown),
            debug_mode: raw.debug_mode.unwrap_or(flag_defaults.debug_mode),
        },
    }
}

fn check_endpoints(units: &IndexMap<EntityName, Unit>, issues: &mut Vec<ValidationIssue>) {
    let mut by_endpoint: IndexMap<&Endpoint, Vec<String>> = IndexMap::new();
    for unit in units.values().filter(|u| u.requires_process()) {
        if let Some(endpoint) = &unit.endpoint {
            by_endpoint
                .entry(endpoint)
                .or_default()
                .push(unit.name.0.clone());
        }
    }
    for (endpoint, names) in by_endpoint {
        if names.len() > 1 {
            issues.push(ValidationIssue::EndpointConflict {
                host: endpoint.host.clone(),
                port: endpoint.port,
                units: names,
            });
        }
    }
}

fn build_group(
    raw: &RawGroup,
    namespace: &HashMap<&str, SourcePosition>,
    issues: &mut Vec<ValidationIssue>,
) -> Group {
    if raw.member_refs.is_empty() {
        issues.push(ValidationIssue::EmptyGroup {
            group: raw.name.clone(),
        });
    }
    for member in &raw.member_refs {
        if !namespace.contains_key(member.as_str()) {
            issues.push(ValidationIssue::UnresolvedReference {
                group: raw.name.clone(),
                member: member.clone(),
            });
        }
    }

    Group {
        name: EntityName::from(raw.name.clone()),
        description: raw.description.clone(),
        member_refs: raw
            .member_refs
            .iter()
            .map(|m| EntityName::from(m.as_str()))
            .collect(),
        directives: raw.directives.clone(),
        overrides: Overrides {
            model: raw.model.clone(),
            ..Overrides::default()
        },
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Depth-first walk over group→group edges; each back edge is one cycle.
fn check_cycles(
    groups: &IndexMap<EntityName, Group>,
    namespace: &HashMap<&str, SourcePosition>,
    issues: &mut Vec<ValidationIssue>,
) {
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut path: Vec<&str> = Vec::new();
    for name in groups.keys() {
        visit(name.as_str(), groups, namespace, &mut marks, &mut path, issues);
    }
}

fn visit<'a>(
    name: &'a str,
    groups: &'a IndexMap<EntityName, Group>,
    namespace: &HashMap<&str, SourcePosition>,
    marks: &mut HashMap<&'a str, Mark>,
    path: &mut Vec<&'a str>,
    issues: &mut Vec<ValidationIssue>,
) {
    match marks.get(name) {
        Some(Mark::Done) => return,
        Some(Mark::InProgress) => {
            if let Some(start) = path.iter().position(|n| *n == name) {
                let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
                cycle.push(name.to_string());
                issues.push(ValidationIssue::CyclicGroup { cycle });
            }
            return;
        }
        None => {}
    }

    let Some(group) = groups.get(name) else {
        return;
    };

    marks.insert(name, Mark::InProgress);
    path.push(name);
    for member in &group.member_refs {
        let is_group = namespace
            .get(member.as_str())
            .is_some_and(|p| p.kind == EntityKind::Group);
        if is_group {
            visit(member.as_str(), groups, namespace, marks, path, issues);
        }
    }
    path.pop();
    marks.insert(name, Mark::Done);
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
