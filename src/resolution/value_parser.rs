use crate::alias::AliasTable;
use crate::errors::{LinkerError, Result};
use crate::graph::{
    AnnotationStore, ObjectMap, Record, ReferenceExpression, ReferenceTarget, ResolvedAnnotation,
    Value,
};
use crate::resolution::PathResolver;
use crate::types::*;

/// Converts raw expressions into linked values.
///
/// Property and navigation paths are resolved on the spot. Paths and
/// annotation paths only get their lookup key here; the reference is queued on
/// the store and the real target is filled in by the final sweep, once every
/// annotation is registered.
pub struct ValueParser<'a> {
    object_map: &'a ObjectMap,
    schema: &'a Schema,
    aliases: &'a AliasTable,
}

impl<'a> ValueParser<'a> {
    pub fn new(object_map: &'a ObjectMap, schema: &'a Schema, aliases: &'a AliasTable) -> Self {
        Self {
            object_map,
            schema,
            aliases,
        }
    }

    /// Converts the value of one raw annotation.
    ///
    /// # Errors
    ///
    /// Returns `LinkerError::UnsupportedAnnotation` if the annotation carries
    /// no record, value or collection, and propagates collection errors.
    pub fn convert_annotation(
        &self,
        annotation: &Annotation,
        current_fqn: &str,
        store: &mut AnnotationStore,
    ) -> Result<Value> {
        if let Some(record) = &annotation.record {
            return Ok(Value::Record(self.parse_record(record, current_fqn, store)?));
        }
        if let Some(collection) = &annotation.collection {
            return Ok(Value::Collection(self.parse_collection(collection, current_fqn, store)?));
        }
        if let Some(value) = &annotation.value {
            return self.parse_value(value, current_fqn, store);
        }
        if annotation.is_collection {
            return Ok(Value::Collection(Vec::new()));
        }
        Err(LinkerError::UnsupportedAnnotation {
            term: annotation.term.clone(),
            target: current_fqn.to_string(),
        })
    }

    pub fn parse_value(
        &self,
        expr: &Expression,
        current_fqn: &str,
        store: &mut AnnotationStore,
    ) -> Result<Value> {
        let value = match expr {
            Expression::String { value } => Value::String(value.clone()),
            Expression::Int { value } => Value::Int(*value),
            Expression::Bool { value } => Value::Bool(*value),
            Expression::Decimal { value } => Value::Decimal(value.clone()),
            Expression::Date { value } => Value::Date(value.clone()),
            Expression::EnumMember { value } => Value::EnumMember(value.clone()),
            Expression::Apply { value } => Value::Apply(value.clone()),
            Expression::Path { value } => {
                self.reference(ReferenceKind::Path, value, current_fqn, store)
            }
            Expression::PropertyPath { value } => {
                self.reference(ReferenceKind::PropertyPath, value, current_fqn, store)
            }
            Expression::NavigationPropertyPath { value } => {
                self.reference(ReferenceKind::NavigationPropertyPath, value, current_fqn, store)
            }
            Expression::AnnotationPath { value } => {
                self.reference(ReferenceKind::AnnotationPath, value, current_fqn, store)
            }
            Expression::Record { value } => {
                Value::Record(self.parse_record(value, current_fqn, store)?)
            }
            Expression::Collection { value } => {
                Value::Collection(self.parse_collection(value, current_fqn, store)?)
            }
        };
        Ok(value)
    }

    /// Parses a record into the store. `$Type` is always the unaliased record
    /// type. Annotations declared inline on the record land in its own
    /// namespace.
    pub fn parse_record(
        &self,
        record: &RecordExpr,
        current_fqn: &str,
        store: &mut AnnotationStore,
    ) -> Result<RecordId> {
        let mut fields = Vec::with_capacity(record.property_values.len());
        for pv in &record.property_values {
            fields.push((pv.name.clone(), self.parse_value(&pv.value, current_fqn, store)?));
        }

        let id = store.push_record(Record {
            record_type: record.record_type.as_deref().map(|t| self.aliases.unalias(t)),
            fields,
            fully_qualified_name: None,
            annotations: AnnotationNamespace::default(),
        });

        for annotation in &record.annotations {
            let value = self.convert_annotation(annotation, current_fqn, store)?;
            let key = self.aliases.term_key(&annotation.term, annotation.qualifier.as_deref());
            let annotation_id = store.push_annotation(ResolvedAnnotation {
                term: key.term.clone(),
                qualifier: annotation.qualifier.clone(),
                fully_qualified_name: None,
                value,
                annotations: AnnotationNamespace::default(),
            });
            store.records[id.0]
                .annotations
                .insert(&key.vocabulary, &key.term_key, annotation_id);
        }

        Ok(id)
    }

    /// Parses a typed collection.
    ///
    /// An empty collection is always `[]`, whatever its declared kind. A
    /// non-empty collection must declare a supported kind and every item must
    /// be of that kind.
    pub fn parse_collection(
        &self,
        collection: &CollectionExpr,
        current_fqn: &str,
        store: &mut AnnotationStore,
    ) -> Result<Vec<Value>> {
        if collection.items.is_empty() {
            return Ok(Vec::new());
        }

        let declared = collection.kind.as_deref().unwrap_or("");
        let kind =
            CollectionKind::from_str(declared).ok_or_else(|| LinkerError::UnsupportedCollection {
                kind: if declared.is_empty() {
                    "<unspecified>".to_string()
                } else {
                    declared.to_string()
                },
                target: current_fqn.to_string(),
            })?;

        collection
            .items
            .iter()
            .map(|item| {
                if item.kind_name() != kind.as_str() {
                    return Err(LinkerError::MismatchedCollectionItem {
                        expected: kind.as_str().to_string(),
                        found: item.kind_name().to_string(),
                        target: current_fqn.to_string(),
                    });
                }
                self.parse_value(item, current_fqn, store)
            })
            .collect()
    }

    fn reference(
        &self,
        kind: ReferenceKind,
        raw: &str,
        current_fqn: &str,
        store: &mut AnnotationStore,
    ) -> Value {
        let path = self.aliases.unalias(raw);
        let resolution = PathResolver::new(self.object_map, self.schema, store, self.aliases)
            .walk(current_fqn, &path);

        let target = if kind.is_deferred() {
            ReferenceTarget::Pending(resolution.path)
        } else {
            match resolution.target {
                Some(target) => ReferenceTarget::Resolved(target),
                None => ReferenceTarget::Unresolved(resolution.path),
            }
        };

        Value::Reference(store.push_reference(ReferenceExpression {
            kind,
            value: raw.to_string(),
            origin: current_fqn.to_string(),
            target,
        }))
    }
}
