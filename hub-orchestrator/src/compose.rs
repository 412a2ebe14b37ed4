//! Runtime objects handed to the coordinating runtime once startup succeeds.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use hub_core::{
    Configuration, Endpoint, EntityKind, HistorySettings, Member, ModelOverride, ModelSelection,
    UnitFlags,
};
use hub_registry::CapabilitySurface;
use indexmap::IndexMap;

#[derive(Debug, Clone)]
pub struct RuntimeUnit {
    pub name: String,
    pub description: String,
    pub directives: Vec<String>,
    pub flags: UnitFlags,
    /// `None` when no model credential is configured and no explicit
    /// provider override names one.
    pub model: Option<ModelSelection>,
    pub history: Option<HistorySettings>,
    pub endpoint: Option<Endpoint>,
    pub surface: Arc<dyn CapabilitySurface>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeMember {
    Unit(String),
    Group(String),
}

impl RuntimeMember {
    pub fn name(&self) -> &str {
        match self {
            RuntimeMember::Unit(name) | RuntimeMember::Group(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeGroup {
    pub name: String,
    pub description: String,
    pub directives: Vec<String>,
    pub model: Option<ModelSelection>,
    /// Declaration order.
    pub members: Vec<RuntimeMember>,
}

/// Every started unit and every group that still has members.
#[derive(Debug, Clone, Default)]
pub struct ComposedSet {
    units: IndexMap<String, RuntimeUnit>,
    groups: IndexMap<String, RuntimeGroup>,
}

impl ComposedSet {
    /// Build runtime objects for the units present in `surfaces`. Members
    /// missing from it are dropped from their groups; a group left empty is
    /// dropped too, which may in turn empty its parents.
    pub(crate) fn compose(
        config: &Configuration,
        surfaces: &HashMap<String, Arc<dyn CapabilitySurface>>,
        default_model: Option<&ModelSelection>,
    ) -> Self {
        let units: IndexMap<String, RuntimeUnit> = config
            .units()
            .filter_map(|unit| {
                let surface = surfaces.get(unit.name.as_str())?;
                Some((
                    unit.name.to_string(),
                    RuntimeUnit {
                        name: unit.name.to_string(),
                        description: unit.description.clone(),
                        directives: unit.directives.clone(),
                        flags: unit.flags,
                        model: resolve_model(default_model, unit.overrides.model.as_ref()),
                        history: unit.overrides.history.clone(),
                        endpoint: unit.endpoint.clone(),
                        surface: Arc::clone(surface),
                    },
                ))
            })
            .collect();

        let mut groups: IndexMap<String, RuntimeGroup> = config
            .groups()
            .map(|group| {
                let members = config
                    .members(group.name.as_str())
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|member| match member {
                        Member::Unit(u) if units.contains_key(u.name.as_str()) => {
                            Some(RuntimeMember::Unit(u.name.to_string()))
                        }
                        Member::Unit(_) => None,
                        Member::Group(g) => Some(RuntimeMember::Group(g.name.to_string())),
                    })
                    .collect();
                (
                    group.name.to_string(),
                    RuntimeGroup {
                        name: group.name.to_string(),
                        description: group.description.clone(),
                        directives: group.directives.clone(),
                        model: resolve_model(default_model, group.overrides.model.as_ref()),
                        members,
                    },
                )
            })
            .collect();

        loop {
            let empty: HashSet<String> = groups
                .values()
                .filter(|g| g.members.is_empty())
                .map(|g| g.name.clone())
                .collect();
            if empty.is_empty() {
                break;
            }
            for name in &empty {
                tracing::warn!(group = %name, "dropping group with no remaining members");
                groups.shift_remove(name);
            }
            for group in groups.values_mut() {
                group
                    .members
                    .retain(|m| !matches!(m, RuntimeMember::Group(name) if empty.contains(name)));
            }
        }

        Self { units, groups }
    }

    pub fn units(&self) -> impl Iterator<Item = &RuntimeUnit> {
        self.units.values()
    }

    pub fn groups(&self) -> impl Iterator<Item = &RuntimeGroup> {
        self.groups.values()
    }

    pub fn unit(&self, name: &str) -> Option<&RuntimeUnit> {
        self.units.get(name)
    }

    pub fn group(&self, name: &str) -> Option<&RuntimeGroup> {
        self.groups.get(name)
    }

    pub fn kind_of(&self, name: &str) -> Option<EntityKind> {
        if self.units.contains_key(name) {
            Some(EntityKind::Unit)
        } else if self.groups.contains_key(name) {
            Some(EntityKind::Group)
        } else {
            None
        }
    }

    pub fn surface(&self, unit: &str) -> Option<Arc<dyn CapabilitySurface>> {
        self.units.get(unit).map(|u| Arc::clone(&u.surface))
    }

    /// Surfaces of every unit reachable from `group`, depth-first in
    /// declaration order, each unit once.
    pub fn group_surfaces(&self, group: &str) -> Option<Vec<Arc<dyn CapabilitySurface>>> {
        self.groups.get(group)?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.collect_surfaces(group, &mut seen, &mut out);
        Some(out)
    }

    fn collect_surfaces(
        &self,
        group: &str,
        seen: &mut HashSet<String>,
        out: &mut Vec<Arc<dyn CapabilitySurface>>,
    ) {
        let Some(group) = self.groups.get(group) else {
            return;
        };
        for member in &group.members {
            if !seen.insert(member.name().to_string()) {
                continue;
            }
            match member {
                RuntimeMember::Unit(name) => {
                    if let Some(surface) = self.surface(name) {
                        out.push(surface);
                    }
                }
                RuntimeMember::Group(name) => self.collect_surfaces(name, seen, out),
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty() && self.groups.is_empty()
    }
}

/// Override on top of the default model. Without a default only an explicit
/// provider/model pair yields a selection.
fn resolve_model(
    default: Option<&ModelSelection>,
    model_override: Option<&ModelOverride>,
) -> Option<ModelSelection> {
    match (default, model_override) {
        (Some(default), model_override) => Some(default.with_override(model_override)),
        (None, Some(ModelOverride::Explicit { provider, model })) => Some(ModelSelection {
            provider: provider.clone(),
            model: model.clone(),
        }),
        (None, _) => None,
    }
}
