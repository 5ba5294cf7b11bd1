use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::alias::AliasTable;
use crate::config::LinkerConfig;
use crate::errors::Result;
use crate::graph::{
    build_object_map, flatten_annotations, normalize_target, AnnotationStore, ObjectMap,
    Record, ReferenceExpression, ReferenceTarget, ResolvedAnnotation, Value,
};
use crate::resolution::{strip_collection, PathResolver, ValueParser};
use crate::types::*;

/// Links a parsed schema and its annotations into a navigable model.
#[derive(Debug, Clone, Default)]
pub struct AnnotationLinker {
    config: LinkerConfig,
}

/// The linked model: schema elements with their link fields filled in, the
/// object map, and the arenas holding every converted annotation value.
#[derive(Debug, Clone)]
pub struct ConvertedModel {
    pub schema: Schema,
    pub references: Vec<Reference>,
    pub object_map: ObjectMap,
    pub store: AnnotationStore,
    /// Annotation list targets that never resolved, unaliased.
    pub unresolved_targets: Vec<String>,
    /// Time taken by the conversion in milliseconds.
    pub duration_ms: u64,
    aliases: AliasTable,
}

/// Summary of a conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkReport {
    pub object_count: usize,
    pub objects_by_kind: BTreeMap<String, usize>,
    pub annotation_count: usize,
    pub record_count: usize,
    pub reference_count: usize,
    pub resolved_reference_count: usize,
    /// Lookup keys of references that stayed unresolved.
    pub unresolved_references: Vec<String>,
    pub unresolved_targets: Vec<String>,
    pub duration_ms: u64,
}

/// Converts `output` with the default configuration.
pub fn convert_types(output: ParserOutput) -> Result<ConvertedModel> {
    AnnotationLinker::default().convert_types(output)
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

impl AnnotationLinker {
    pub fn new(config: LinkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LinkerConfig {
        &self.config
    }

    /// Runs the whole conversion.
    ///
    /// Element links (navigation targets, bound actions, entity set types)
    /// are wired before any annotation is converted. Annotation lists are then
    /// attached in a first pass; lists targeting annotations that are not
    /// converted yet are retried in later rounds. Deferred references are
    /// filled in last.
    ///
    /// # Errors
    ///
    /// Fails on structurally invalid annotations (unsupported collection
    /// kinds, annotations without a value). Unresolvable paths are not errors.
    pub fn convert_types(&self, output: ParserOutput) -> Result<ConvertedModel> {
        let start = Instant::now();
        let ParserOutput { references, schema } = output;
        let aliases = self.alias_table(&references, &schema);
        let lists = flatten_annotations(&schema);

        info!(
            namespace = %schema.namespace,
            entity_types = schema.entity_types.len(),
            annotation_lists = lists.len(),
            "linking schema"
        );

        // 1. Object map
        let object_map = build_object_map(&schema, &lists, &aliases);

        let mut linker = Linker {
            aliases: &aliases,
            schema,
            object_map,
            store: AnnotationStore::new(),
            unresolved_targets: Vec::new(),
        };

        // 2-4. Element links
        linker.link_navigation_properties();
        linker.link_actions();
        linker.link_entity_sets();

        // 5. First pass
        let mut pending = Vec::new();
        for (index, list) in lists.iter().enumerate() {
            let target_fqn = normalize_target(&aliases.unalias(&list.target));
            match linker.object_map.get(&target_fqn) {
                Some(target) if target.is_annotatable() => {
                    linker.attach_list(target, &target_fqn, list)?;
                }
                Some(_) => pending.push(index),
                None if target_fqn.contains('@') => pending.push(index),
                None => {
                    debug!(target = %target_fqn, "annotation target not found");
                    linker.unresolved_targets.push(target_fqn);
                }
            }
        }

        // 6. Forward references
        let mut round = 0;
        while !pending.is_empty() && round < self.config.forward_reference_passes {
            round += 1;
            let before = pending.len();
            let mut remaining = Vec::new();
            for index in pending {
                let list = &lists[index];
                let target_fqn = normalize_target(&aliases.unalias(&list.target));
                match linker.resolve_forward_target(&target_fqn) {
                    Some(target) => linker.attach_list(target, &target_fqn, list)?,
                    None => remaining.push(index),
                }
            }
            trace!(round, resolved = before - remaining.len(), "forward reference round");
            pending = remaining;
            if pending.len() == before {
                break;
            }
        }
        for index in pending {
            let target_fqn = normalize_target(&aliases.unalias(&lists[index].target));
            debug!(target = %target_fqn, "annotation-on-annotation target not found");
            linker.unresolved_targets.push(target_fqn);
        }

        // 7. Final sweep
        linker.resolve_deferred_references();

        let Linker {
            schema,
            object_map,
            store,
            unresolved_targets,
            ..
        } = linker;

        let model = ConvertedModel {
            schema,
            references,
            object_map,
            store,
            unresolved_targets,
            duration_ms: start.elapsed().as_millis() as u64,
            aliases,
        };

        info!(
            objects = model.object_map.len(),
            annotations = model.store.annotations.len(),
            unresolved_targets = model.unresolved_targets.len(),
            duration_ms = model.duration_ms,
            "schema linked"
        );

        Ok(model)
    }

    /// Configured aliases first, then the document's references, then the
    /// schema's own alias. Later entries win.
    fn alias_table(&self, references: &[Reference], schema: &Schema) -> AliasTable {
        let own = schema.alias.as_ref().map(|alias| Reference {
            alias: alias.clone(),
            namespace: schema.namespace.clone(),
            uri: None,
        });
        AliasTable::new(
            self.config
                .vocabulary_aliases
                .iter()
                .chain(references)
                .cloned()
                .chain(own),
        )
    }
}

/// Mutable state of one conversion.
struct Linker<'a> {
    aliases: &'a AliasTable,
    schema: Schema,
    object_map: ObjectMap,
    store: AnnotationStore,
    unresolved_targets: Vec<String>,
}

impl Linker<'_> {
    fn entity_type_index(&self, type_name: &str) -> Option<usize> {
        match self.object_map.get(&self.aliases.unalias(strip_collection(type_name))) {
            Some(Target::EntityType(i)) => Some(i),
            _ => None,
        }
    }

    /// Sets `target_type` on every navigation property, V4 through the type
    /// name and V2 through the association end named by `to_role`.
    fn link_navigation_properties(&mut self) {
        let mut links = Vec::new();
        for (e, entity_type) in self.schema.entity_types.iter().enumerate() {
            for (n, nav) in entity_type.navigation_properties.iter().enumerate() {
                let target = self
                    .navigation_target_name(nav)
                    .and_then(|name| self.entity_type_index(&name));
                if target.is_none() {
                    debug!(
                        navigation = %nav.fully_qualified_name,
                        "navigation target type not found"
                    );
                }
                links.push((e, n, target));
            }
        }
        for (e, n, target) in links {
            self.schema.entity_types[e].navigation_properties[n].target_type = target;
        }
    }

    fn navigation_target_name(&self, nav: &NavigationProperty) -> Option<String> {
        if let Some(name) = &nav.target_type_name {
            return Some(name.clone());
        }
        let relationship = self.aliases.unalias(nav.relationship.as_deref()?);
        let to_role = nav.to_role.as_deref()?;
        let association = self
            .schema
            .associations
            .iter()
            .find(|a| a.fully_qualified_name == relationship)?;
        association
            .association_end
            .iter()
            .find(|end| end.role == to_role)
            .map(|end| end.type_name.clone())
    }

    /// Wires bound actions to their source entity type under both the bare
    /// and the namespace-qualified name, and resolves return entity types.
    fn link_actions(&mut self) {
        let namespace = self.schema.namespace.clone();
        for i in 0..self.schema.actions.len() {
            let action = &self.schema.actions[i];
            let return_entity_type = self.entity_type_index(&action.return_type);
            let source_entity_type = if action.is_bound {
                self.entity_type_index(&action.source_type)
            } else {
                None
            };
            let name = action.name.clone();

            let action = &mut self.schema.actions[i];
            action.return_entity_type = return_entity_type;
            action.source_entity_type = source_entity_type;

            if let Some(source) = source_entity_type {
                let actions = &mut self.schema.entity_types[source].actions;
                actions.insert(format!("{namespace}.{name}"), i);
                actions.insert(name, i);
            }
        }
    }

    fn link_entity_sets(&mut self) {
        for i in 0..self.schema.entity_sets.len() {
            let instance = self.entity_type_index(&self.schema.entity_sets[i].entity_type);
            self.schema.entity_sets[i].entity_type_instance = instance;
        }
    }

    /// Converts every annotation of `list` and attaches it to `target`.
    ///
    /// Each value lands in the target's namespace and is registered in the
    /// object map as `target@term[#qualifier]`, where later lists can target it.
    fn attach_list(
        &mut self,
        target: Target,
        target_fqn: &str,
        list: &AnnotationList,
    ) -> Result<()> {
        trace!(target = %target_fqn, annotations = list.annotations.len(), "attaching annotations");

        if let Target::Record(id) = target {
            if let Some(record) = self.store.records.get_mut(id.0) {
                record.fully_qualified_name.get_or_insert_with(|| target_fqn.to_string());
            }
        }

        for annotation in &list.annotations {
            let value = ValueParser::new(&self.object_map, &self.schema, self.aliases)
                .convert_annotation(annotation, target_fqn, &mut self.store)?;
            let qualifier = annotation.qualifier.as_deref();
            let key = self.aliases.term_key(&annotation.term, qualifier);
            let fqn = self.aliases.annotation_fqn(target_fqn, &annotation.term, qualifier);

            let id = self.store.push_annotation(ResolvedAnnotation {
                term: key.term.clone(),
                qualifier: annotation.qualifier.clone(),
                fully_qualified_name: Some(fqn.clone()),
                value,
                annotations: AnnotationNamespace::default(),
            });
            if let Some(namespace) = namespace_mut(&mut self.schema, &mut self.store, target) {
                namespace.insert(&key.vocabulary, &key.term_key, id);
            }
            self.object_map.insert(fqn, Target::Annotation(id));
        }
        Ok(())
    }

    /// Finds the target of a list whose target is itself an annotation path.
    ///
    /// The target splits at its last `@`: the head plus the first segment of
    /// the tail name an attached annotation, and the remaining segments walk
    /// into its value.
    fn resolve_forward_target(&self, target_fqn: &str) -> Option<Target> {
        let at = target_fqn.rfind('@')?;
        let head = &target_fqn[..at];
        let mut segments = target_fqn[at + 1..].split('/');
        let term = segments.next().filter(|t| !t.is_empty())?;
        match self.object_map.get(&format!("{head}@{term}"))? {
            Target::Annotation(id) => self.store.walk_annotation(id, segments),
            _ => None,
        }
    }

    /// Replaces every pending reference key with what it denotes now that
    /// all annotations are attached.
    ///
    /// Records are not in the object map, so a key that misses is walked
    /// again from the reference's origin; that walk can step into annotation
    /// values.
    fn resolve_deferred_references(&mut self) {
        let pending = std::mem::take(&mut self.store.to_resolve);
        let resolver =
            PathResolver::new(&self.object_map, &self.schema, &self.store, self.aliases);

        let mut updates = Vec::with_capacity(pending.len());
        for id in pending {
            let Some(reference) = self.store.reference(id) else {
                continue;
            };
            let ReferenceTarget::Pending(key) = &reference.target else {
                continue;
            };
            let found = self.object_map.get_linked(key).or_else(|| {
                let path = self.aliases.unalias(&reference.value);
                resolver
                    .resolve_target(&reference.origin, &path)
                    .filter(Target::is_annotatable)
            });
            let target = match found {
                Some(target) => ReferenceTarget::Resolved(target),
                None => {
                    debug!(path = %reference.value, key = %key, "reference target not found");
                    ReferenceTarget::Unresolved(key.clone())
                }
            };
            updates.push((id, target));
        }

        for (id, target) in updates {
            if let Some(reference) = self.store.references.get_mut(id.0) {
                reference.target = target;
            }
        }
    }
}

fn namespace_mut<'s>(
    schema: &'s mut Schema,
    store: &'s mut AnnotationStore,
    target: Target,
) -> Option<&'s mut AnnotationNamespace> {
    match target {
        Target::EntityContainer => schema.entity_container.as_mut().map(|c| &mut c.annotations),
        Target::EntitySet(i) => schema.entity_sets.get_mut(i).map(|s| &mut s.annotations),
        Target::EntityType(i) => schema.entity_types.get_mut(i).map(|e| &mut e.annotations),
        Target::Property { entity_type, index } => schema
            .entity_types
            .get_mut(entity_type)?
            .entity_properties
            .get_mut(index)
            .map(|p| &mut p.annotations),
        Target::NavigationProperty { entity_type, index } => schema
            .entity_types
            .get_mut(entity_type)?
            .navigation_properties
            .get_mut(index)
            .map(|n| &mut n.annotations),
        Target::Action(i) => schema.actions.get_mut(i).map(|a| &mut a.annotations),
        Target::ActionParameter { action, index } => schema
            .actions
            .get_mut(action)?
            .parameters
            .get_mut(index)
            .map(|p| &mut p.annotations),
        Target::RawAnnotation { .. } => None,
        Target::Annotation(id) => store.annotations.get_mut(id.0).map(|a| &mut a.annotations),
        Target::Record(id) => store.records.get_mut(id.0).map(|r| &mut r.annotations),
    }
}

// ---------------------------------------------------------------------------
// Model queries
// ---------------------------------------------------------------------------

impl ConvertedModel {
    /// Looks up a fully qualified name, hiding annotations that never got a
    /// value.
    pub fn get(&self, fqn: &str) -> Option<Target> {
        self.object_map.get_linked(fqn)
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn entity_type(&self, fqn: &str) -> Option<&EntityType> {
        match self.get(fqn)? {
            Target::EntityType(i) => self.schema.entity_types.get(i),
            _ => None,
        }
    }

    pub fn entity_set(&self, fqn: &str) -> Option<&EntitySet> {
        match self.get(fqn)? {
            Target::EntitySet(i) => self.schema.entity_sets.get(i),
            _ => None,
        }
    }

    pub fn action(&self, index: usize) -> Option<&Action> {
        self.schema.actions.get(index)
    }

    pub fn annotation(&self, id: AnnotationId) -> Option<&ResolvedAnnotation> {
        self.store.annotation(id)
    }

    pub fn record(&self, id: RecordId) -> Option<&Record> {
        self.store.record(id)
    }

    pub fn reference(&self, id: ReferenceId) -> Option<&ReferenceExpression> {
        self.store.reference(id)
    }

    /// The resolved `$target` of a reference value.
    pub fn reference_target(&self, value: &Value) -> Option<Target> {
        self.reference(value.as_reference()?)?.resolved()
    }

    /// The `annotations` namespace of an annotatable target.
    pub fn annotations_of(&self, target: Target) -> Option<&AnnotationNamespace> {
        let schema = &self.schema;
        match target {
            Target::EntityContainer => schema.entity_container.as_ref().map(|c| &c.annotations),
            Target::EntitySet(i) => schema.entity_sets.get(i).map(|s| &s.annotations),
            Target::EntityType(i) => schema.entity_types.get(i).map(|e| &e.annotations),
            Target::Property { entity_type, index } => schema
                .entity_types
                .get(entity_type)?
                .entity_properties
                .get(index)
                .map(|p| &p.annotations),
            Target::NavigationProperty { entity_type, index } => schema
                .entity_types
                .get(entity_type)?
                .navigation_properties
                .get(index)
                .map(|n| &n.annotations),
            Target::Action(i) => schema.actions.get(i).map(|a| &a.annotations),
            Target::ActionParameter { action, index } => schema
                .actions
                .get(action)?
                .parameters
                .get(index)
                .map(|p| &p.annotations),
            Target::RawAnnotation { .. } => None,
            Target::Annotation(id) => self.store.annotation(id).map(|a| &a.annotations),
            Target::Record(id) => self.store.record(id).map(|r| &r.annotations),
        }
    }

    /// `target.annotations[vocabulary][term_key]`.
    pub fn annotation_for(
        &self,
        target: Target,
        vocabulary: &str,
        term_key: &str,
    ) -> Option<&ResolvedAnnotation> {
        let id = self.annotations_of(target)?.get(vocabulary, term_key)?;
        self.annotation(id)
    }

    /// The fully qualified name of a target, where it has one.
    pub fn fqn_of(&self, target: Target) -> Option<&str> {
        let schema = &self.schema;
        match target {
            Target::EntityContainer => schema
                .entity_container
                .as_ref()
                .map(|c| c.fully_qualified_name.as_str()),
            Target::EntitySet(i) => schema
                .entity_sets
                .get(i)
                .map(|s| s.fully_qualified_name.as_str()),
            Target::EntityType(i) => schema
                .entity_types
                .get(i)
                .map(|e| e.fully_qualified_name.as_str()),
            Target::Property { entity_type, index } => schema
                .entity_types
                .get(entity_type)?
                .entity_properties
                .get(index)
                .map(|p| p.fully_qualified_name.as_str()),
            Target::NavigationProperty { entity_type, index } => schema
                .entity_types
                .get(entity_type)?
                .navigation_properties
                .get(index)
                .map(|n| n.fully_qualified_name.as_str()),
            Target::Action(i) => schema.actions.get(i).map(|a| a.fully_qualified_name.as_str()),
            Target::ActionParameter { action, index } => schema
                .actions
                .get(action)?
                .parameters
                .get(index)
                .map(|p| p.fully_qualified_name.as_str()),
            Target::RawAnnotation { .. } => None,
            Target::Annotation(id) => self.store.annotation(id)?.fully_qualified_name.as_deref(),
            Target::Record(id) => self.store.record(id)?.fully_qualified_name.as_deref(),
        }
    }

    /// Resolves `relative_path` from the entity type at `entity_type`.
    pub fn resolve_path(&self, entity_type: usize, relative_path: &str) -> Option<Target> {
        let fqn = &self.schema.entity_types.get(entity_type)?.fully_qualified_name;
        self.resolve_from(fqn, relative_path)
    }

    /// Resolves `path` relative to the element named `fqn`. Aliases in the
    /// path are expanded first.
    pub fn resolve_from(&self, fqn: &str, path: &str) -> Option<Target> {
        let path = self.aliases.unalias(path);
        PathResolver::new(&self.object_map, &self.schema, &self.store, &self.aliases)
            .resolve_target(&self.aliases.unalias(fqn), &path)
            .filter(Target::is_annotatable)
    }

    pub fn report(&self) -> LinkReport {
        let mut objects_by_kind: BTreeMap<String, usize> = BTreeMap::new();
        for (_, target) in self.object_map.iter() {
            *objects_by_kind.entry(target.kind().as_str().to_string()).or_default() += 1;
        }

        let mut unresolved_references: Vec<String> = self
            .store
            .references
            .iter()
            .filter_map(|r| match &r.target {
                ReferenceTarget::Unresolved(key) | ReferenceTarget::Pending(key) => {
                    Some(key.clone())
                }
                ReferenceTarget::Resolved(_) => None,
            })
            .collect();
        unresolved_references.sort();
        unresolved_references.dedup();

        LinkReport {
            object_count: self.object_map.len(),
            objects_by_kind,
            annotation_count: self.store.annotations.len(),
            record_count: self.store.records.len(),
            reference_count: self.store.references.len(),
            resolved_reference_count: self
                .store
                .references
                .iter()
                .filter(|r| r.resolved().is_some())
                .count(),
            unresolved_references,
            unresolved_targets: self.unresolved_targets.clone(),
            duration_ms: self.duration_ms,
        }
    }
}
