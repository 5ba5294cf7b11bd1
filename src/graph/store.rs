use serde::{Deserialize, Serialize};

use crate::types::*;

/// A linked annotation value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    /// Decimal literal as written, so no digits are lost.
    Decimal(String),
    Date(String),
    EnumMember(String),
    Apply(serde_json::Value),
    Reference(ReferenceId),
    Record(RecordId),
    Collection(Vec<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Decimal(s) | Value::Date(s) | Value::EnumMember(s) => {
                Some(s)
            }
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<RecordId> {
        match self {
            Value::Record(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ReferenceId> {
        match self {
            Value::Reference(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&[Value]> {
        match self {
            Value::Collection(items) => Some(items),
            _ => None,
        }
    }
}

/// An annotation after conversion, stamped with its term and qualifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAnnotation {
    /// Unaliased term.
    pub term: String,
    pub qualifier: Option<String>,
    /// Object map key. `None` for annotations declared inline on a record.
    pub fully_qualified_name: Option<String>,
    pub value: Value,
    pub annotations: AnnotationNamespace,
}

/// A parsed record expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unaliased `$Type`.
    pub record_type: Option<String>,
    pub fields: Vec<(String, Value)>,
    /// Set once the record becomes the target of an annotation list.
    pub fully_qualified_name: Option<String>,
    pub annotations: AnnotationNamespace,
}

impl Record {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// State of a reference expression's `$target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceTarget {
    Resolved(Target),
    /// Object map key to look up in the final sweep.
    Pending(String),
    /// The key that was looked up and missed.
    Unresolved(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceExpression {
    pub kind: ReferenceKind,
    /// The path exactly as written.
    pub value: String,
    /// Name of the element the path is relative to.
    pub origin: String,
    pub target: ReferenceTarget,
}

impl ReferenceExpression {
    /// The resolved `$target`, if any.
    pub fn resolved(&self) -> Option<Target> {
        match self.target {
            ReferenceTarget::Resolved(t) => Some(t),
            _ => None,
        }
    }
}

/// Owns every converted annotation, record and reference expression.
///
/// Values point at each other through arena handles, so the graph can hold
/// forward references without shared mutable pointers. `to_resolve` lists
/// the references waiting for the final sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationStore {
    pub annotations: Vec<ResolvedAnnotation>,
    pub records: Vec<Record>,
    pub references: Vec<ReferenceExpression>,
    pub to_resolve: Vec<ReferenceId>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_annotation(&mut self, annotation: ResolvedAnnotation) -> AnnotationId {
        self.annotations.push(annotation);
        AnnotationId(self.annotations.len() - 1)
    }

    pub fn push_record(&mut self, record: Record) -> RecordId {
        self.records.push(record);
        RecordId(self.records.len() - 1)
    }

    /// Stores a reference; pending ones are queued for the final sweep.
    pub fn push_reference(&mut self, reference: ReferenceExpression) -> ReferenceId {
        let pending = matches!(reference.target, ReferenceTarget::Pending(_));
        self.references.push(reference);
        let id = ReferenceId(self.references.len() - 1);
        if pending {
            self.to_resolve.push(id);
        }
        id
    }

    pub fn annotation(&self, id: AnnotationId) -> Option<&ResolvedAnnotation> {
        self.annotations.get(id.0)
    }

    pub fn record(&self, id: RecordId) -> Option<&Record> {
        self.records.get(id.0)
    }

    pub fn reference(&self, id: ReferenceId) -> Option<&ReferenceExpression> {
        self.references.get(id.0)
    }

    /// Steps one path segment into a value: a field name on a record or an
    /// index into a collection.
    pub fn step<'v>(&'v self, value: &'v Value, segment: &str) -> Option<&'v Value> {
        match value {
            Value::Record(id) => self.record(*id)?.field(segment),
            Value::Collection(items) => items.get(segment.parse::<usize>().ok()?),
            _ => None,
        }
    }

    /// Steps one segment into the value carried by an annotation or record
    /// target.
    pub fn step_from(&self, target: Target, segment: &str) -> Option<&Value> {
        match target {
            Target::Annotation(id) => self.step(&self.annotation(id)?.value, segment),
            Target::Record(id) => self.record(id)?.field(segment),
            _ => None,
        }
    }

    /// Walks `segments` from the value of annotation `id`.
    ///
    /// With no segments the annotation itself is the result. Otherwise the
    /// walk must end on a record, since only records can carry annotations.
    pub fn walk_annotation<'s>(
        &self,
        id: AnnotationId,
        segments: impl IntoIterator<Item = &'s str>,
    ) -> Option<Target> {
        let mut current = &self.annotation(id)?.value;
        let mut moved = false;
        for segment in segments.into_iter().filter(|s| !s.is_empty()) {
            current = self.step(current, segment)?;
            moved = true;
        }
        if !moved {
            return Some(Target::Annotation(id));
        }
        current.as_record().map(Target::Record)
    }
}
