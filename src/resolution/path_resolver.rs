use crate::alias::AliasTable;
use crate::graph::{AnnotationStore, ObjectMap, Value};
use crate::types::*;

/// Outcome of walking a relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolution {
    /// What the path denotes, if every step was found.
    pub target: Option<Target>,
    /// The last lookup key computed, whether or not it was found.
    pub path: String,
}

/// Position of the walk between two segments.
#[derive(Debug, Clone, Copy)]
enum Cursor {
    Start,
    At(Target),
    /// A previous segment missed; remaining segments are appended verbatim.
    Lost,
}

/// Resolves relative paths against the linked schema.
///
/// The path is made absolute from the current target's name and walked one
/// segment at a time. How a segment extends the lookup key depends on the
/// kind of the element reached so far, not on the segment text:
/// entity sets continue at their entity type, navigation properties at
/// their target type, properties at their owner, and so on. Type names taken
/// from the schema are unaliased before they become part of a key.
pub struct PathResolver<'a> {
    object_map: &'a ObjectMap,
    schema: &'a Schema,
    store: &'a AnnotationStore,
    aliases: &'a AliasTable,
}

impl<'a> PathResolver<'a> {
    pub fn new(
        object_map: &'a ObjectMap,
        schema: &'a Schema,
        store: &'a AnnotationStore,
        aliases: &'a AliasTable,
    ) -> Self {
        Self {
            object_map,
            schema,
            store,
            aliases,
        }
    }

    /// Returns what `path` denotes relative to the element named `current_fqn`.
    pub fn resolve_target(&self, current_fqn: &str, path: &str) -> Option<Target> {
        self.walk(current_fqn, path).target
    }

    /// Returns only the final lookup key for `path`, found or not.
    ///
    /// Used for references whose target may not exist until every
    /// annotation has been converted.
    pub fn resolve_path(&self, current_fqn: &str, path: &str) -> String {
        self.walk(current_fqn, path).path
    }

    pub fn walk(&self, current_fqn: &str, path: &str) -> PathResolution {
        if path.is_empty() {
            return PathResolution {
                target: None,
                path: String::new(),
            };
        }

        let absolute = combine_path(current_fqn, path);
        let mut cursor = Cursor::Start;
        let mut current_path = String::new();

        for segment in absolute.split('/') {
            if let Cursor::At(target) = cursor {
                if let Some(record) = self.step_into_record(target, segment) {
                    current_path = combine_path(&current_path, segment);
                    cursor = Cursor::At(Target::Record(record));
                    continue;
                }
            }

            current_path = match cursor {
                Cursor::Start => segment.to_string(),
                Cursor::Lost => combine_path(&current_path, segment),
                Cursor::At(target) => {
                    self.next_path(target, &current_path, current_fqn, segment)
                }
            };

            cursor = match self.object_map.get(&current_path) {
                Some(target) => Cursor::At(target),
                None => Cursor::Lost,
            };
        }

        PathResolution {
            target: match cursor {
                Cursor::At(target) => Some(target),
                _ => None,
            },
            path: current_path,
        }
    }

    /// Computes the lookup key for `segment` given the element reached so far.
    fn next_path(
        &self,
        target: Target,
        current_path: &str,
        current_fqn: &str,
        segment: &str,
    ) -> String {
        match target {
            Target::EntitySet(i) => match self.schema.entity_sets.get(i) {
                Some(set) if !set.entity_type.is_empty() => {
                    self.type_path(&set.entity_type, segment)
                }
                _ => combine_path(current_path, segment),
            },
            Target::NavigationProperty { entity_type, index } => {
                let nav = self
                    .schema
                    .entity_types
                    .get(entity_type)
                    .and_then(|e| e.navigation_properties.get(index));
                match nav {
                    Some(NavigationProperty {
                        target_type_name: Some(name),
                        ..
                    }) => self.type_path(name, segment),
                    Some(nav) => {
                        let linked = nav.target_type.and_then(|t| self.schema.entity_types.get(t));
                        match linked {
                            Some(target_type) => {
                                combine_path(&target_type.fully_qualified_name, segment)
                            }
                            None => combine_path(current_path, segment),
                        }
                    }
                    None => combine_path(current_path, segment),
                }
            }
            Target::Property { .. } => {
                // Annotations sit on the property itself; anything else is a
                // sibling reached through the owner.
                if segment.starts_with('@') {
                    combine_path(current_path, segment)
                } else {
                    combine_path(parent_path(current_fqn), segment)
                }
            }
            Target::Action(i) => match self.schema.actions.get(i) {
                Some(action) if action.is_bound => {
                    let path = combine_path(&action.fully_qualified_name, segment);
                    if self.object_map.contains(&path) || action.source_type.is_empty() {
                        path
                    } else {
                        self.type_path(&action.source_type, segment)
                    }
                }
                _ => combine_path(current_path, segment),
            },
            Target::ActionParameter { action, index } => {
                let param = self.schema.actions.get(action).and_then(|a| a.parameters.get(index));
                match param {
                    Some(param) if param.is_entity_set => {
                        self.type_path(&param.type_name, segment)
                    }
                    Some(_) => {
                        let parent = parent_path(current_fqn);
                        let path = combine_path(parent, segment);
                        if self.object_map.contains(&path) {
                            return path;
                        }
                        match self.object_map.get(parent) {
                            Some(Target::Action(a)) => match self.schema.actions.get(a) {
                                Some(owner) if !owner.source_type.is_empty() => {
                                    self.type_path(&owner.source_type, segment)
                                }
                                _ => path,
                            },
                            _ => path,
                        }
                    }
                    None => combine_path(current_path, segment),
                }
            }
            _ => combine_path(current_path, segment),
        }
    }

    /// Continues at a type named in the schema, which may be aliased or
    /// wrapped in `Collection(...)`.
    fn type_path(&self, type_name: &str, segment: &str) -> String {
        combine_path(&self.aliases.unalias(strip_collection(type_name)), segment)
    }

    fn step_into_record(&self, target: Target, segment: &str) -> Option<RecordId> {
        if segment.starts_with('@') {
            return None;
        }
        self.store.step_from(target, segment).and_then(Value::as_record)
    }
}

/// Joins a path segment onto a base name. Annotation segments (`@Term`)
/// attach directly; everything else goes through `/`.
pub fn combine_path(base: &str, segment: &str) -> String {
    if base.is_empty() {
        segment.to_string()
    } else if segment.starts_with('@') {
        format!("{base}{segment}")
    } else {
        format!("{base}/{segment}")
    }
}

/// Strips the last `/` component of a name. Names without one are their own
/// parent.
pub fn parent_path(fqn: &str) -> &str {
    match fqn.rfind('/') {
        Some(idx) => &fqn[..idx],
        None => fqn,
    }
}

/// `Collection(NS.Type)` -> `NS.Type`.
pub fn strip_collection(type_name: &str) -> &str {
    type_name
        .strip_prefix("Collection(")
        .and_then(|t| t.strip_suffix(')'))
        .unwrap_or(type_name)
}
