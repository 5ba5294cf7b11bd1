use std::collections::HashMap;

use tracing::trace;

use crate::alias::AliasTable;
use crate::types::*;

/// Registry from fully qualified name to the thing it denotes.
///
/// Built once before linking, then grows as converted annotations register
/// under their own names. A later insert under an existing key replaces the
/// earlier entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMap {
    entries: HashMap<String, Target>,
}

impl ObjectMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, fqn: &str) -> Option<Target> {
        self.entries.get(fqn).copied()
    }

    /// Like `get`, but hides annotations whose value is not converted yet.
    pub fn get_linked(&self, fqn: &str) -> Option<Target> {
        self.get(fqn).filter(Target::is_annotatable)
    }

    pub fn contains(&self, fqn: &str) -> bool {
        self.entries.contains_key(fqn)
    }

    /// Inserts `target` under `fqn`, returning the entry it replaced.
    pub fn insert(&mut self, fqn: impl Into<String>, target: Target) -> Option<Target> {
        let fqn = fqn.into();
        let previous = self.entries.insert(fqn.clone(), target);
        if let Some(prev) = previous {
            if prev != target {
                trace!(fqn = %fqn, replaced = prev.kind().as_str(), "object map entry overwritten");
            }
        }
        previous
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Target)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Flattens the schema into a single name-addressable map.
///
/// Registers the entity container, entity sets, actions with their
/// parameters, entity types with their properties and navigation properties,
/// and finally every raw annotation under `target@term[#qualifier]`. The
/// early annotation entries let annotations that target other annotations
/// find their target before its value has been converted.
pub fn build_object_map(
    schema: &Schema,
    lists: &[AnnotationList],
    aliases: &AliasTable,
) -> ObjectMap {
    let mut map = ObjectMap::new();

    if let Some(container) = &schema.entity_container {
        map.insert(container.fully_qualified_name.as_str(), Target::EntityContainer);
    }

    for (i, set) in schema.entity_sets.iter().enumerate() {
        map.insert(set.fully_qualified_name.as_str(), Target::EntitySet(i));
    }

    for (a, action) in schema.actions.iter().enumerate() {
        map.insert(action.fully_qualified_name.as_str(), Target::Action(a));
        for (index, param) in action.parameters.iter().enumerate() {
            map.insert(
                param.fully_qualified_name.as_str(),
                Target::ActionParameter { action: a, index },
            );
        }
    }

    for (e, entity_type) in schema.entity_types.iter().enumerate() {
        map.insert(entity_type.fully_qualified_name.as_str(), Target::EntityType(e));
        for (index, prop) in entity_type.entity_properties.iter().enumerate() {
            map.insert(
                prop.fully_qualified_name.as_str(),
                Target::Property {
                    entity_type: e,
                    index,
                },
            );
        }
        for (index, nav) in entity_type.navigation_properties.iter().enumerate() {
            map.insert(
                nav.fully_qualified_name.as_str(),
                Target::NavigationProperty {
                    entity_type: e,
                    index,
                },
            );
        }
    }

    for (list_index, list) in lists.iter().enumerate() {
        let target = normalize_target(&aliases.unalias(&list.target));
        for (index, annotation) in list.annotations.iter().enumerate() {
            let qualifier = annotation.qualifier.as_deref();
            let fqn = aliases.annotation_fqn(&target, &annotation.term, qualifier);
            map.insert(fqn, Target::RawAnnotation { list: list_index, index });
        }
    }

    map
}

/// Flattens the per-document annotation lists into one sequence, documents in
/// key order. `Target::RawAnnotation::list` indexes this sequence.
pub fn flatten_annotations(schema: &Schema) -> Vec<AnnotationList> {
    schema.annotations.values().flatten().cloned().collect()
}

/// Folds the `X/@Term` spelling of an annotation target into `X@Term`.
pub fn normalize_target(target: &str) -> String {
    target.replace("/@", "@")
}
