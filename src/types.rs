use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// Kinds of addressable things in the linked model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    EntityContainer,
    EntitySet,
    EntityType,
    Property,
    NavigationProperty,
    Action,
    ActionParameter,
    RawAnnotation,
    Annotation,
    Record,
}

#[allow(clippy::should_implement_trait)]
impl ElementKind {
    /// Returns the string representation of this element kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::EntityContainer => "entity_container",
            ElementKind::EntitySet => "entity_set",
            ElementKind::EntityType => "entity_type",
            ElementKind::Property => "property",
            ElementKind::NavigationProperty => "navigation_property",
            ElementKind::Action => "action",
            ElementKind::ActionParameter => "action_parameter",
            ElementKind::RawAnnotation => "raw_annotation",
            ElementKind::Annotation => "annotation",
            ElementKind::Record => "record",
        }
    }

    /// Parses a string into an `ElementKind`, returning `None` for unrecognized values.
    pub fn from_str(s: &str) -> Option<ElementKind> {
        match s {
            "entity_container" => Some(ElementKind::EntityContainer),
            "entity_set" => Some(ElementKind::EntitySet),
            "entity_type" => Some(ElementKind::EntityType),
            "property" => Some(ElementKind::Property),
            "navigation_property" => Some(ElementKind::NavigationProperty),
            "action" => Some(ElementKind::Action),
            "action_parameter" => Some(ElementKind::ActionParameter),
            "raw_annotation" => Some(ElementKind::RawAnnotation),
            "annotation" => Some(ElementKind::Annotation),
            "record" => Some(ElementKind::Record),
            _ => None,
        }
    }
}

/// The four reference expression kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceKind {
    Path,
    PropertyPath,
    NavigationPropertyPath,
    AnnotationPath,
}

#[allow(clippy::should_implement_trait)]
impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "Path",
            Self::PropertyPath => "PropertyPath",
            Self::NavigationPropertyPath => "NavigationPropertyPath",
            Self::AnnotationPath => "AnnotationPath",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Path" => Some(Self::Path),
            "PropertyPath" => Some(Self::PropertyPath),
            "NavigationPropertyPath" => Some(Self::NavigationPropertyPath),
            "AnnotationPath" => Some(Self::AnnotationPath),
            _ => None,
        }
    }

    /// Whether references of this kind wait for the final sweep.
    ///
    /// `Path` and `AnnotationPath` may point at annotations that are not
    /// converted yet; property and navigation paths only ever name schema
    /// elements, which are registered before any annotation is processed.
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Path | Self::AnnotationPath)
    }
}

/// Element kinds a typed collection may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectionKind {
    PropertyPath,
    Path,
    AnnotationPath,
    NavigationPropertyPath,
    Record,
    String,
}

#[allow(clippy::should_implement_trait)]
impl CollectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PropertyPath => "PropertyPath",
            Self::Path => "Path",
            Self::AnnotationPath => "AnnotationPath",
            Self::NavigationPropertyPath => "NavigationPropertyPath",
            Self::Record => "Record",
            Self::String => "String",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PropertyPath" => Some(Self::PropertyPath),
            "Path" => Some(Self::Path),
            "AnnotationPath" => Some(Self::AnnotationPath),
            "NavigationPropertyPath" => Some(Self::NavigationPropertyPath),
            "Record" => Some(Self::Record),
            "String" => Some(Self::String),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Arena handles
// ---------------------------------------------------------------------------

/// Index of a resolved annotation in the annotation store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnnotationId(pub usize);

/// Index of a parsed record in the annotation store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub usize);

/// Index of a reference expression in the annotation store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReferenceId(pub usize);

/// Anything the object map can point at.
///
/// Schema elements are addressed by their position in the schema vectors,
/// annotation values by their arena handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    EntityContainer,
    EntitySet(usize),
    EntityType(usize),
    Property { entity_type: usize, index: usize },
    NavigationProperty { entity_type: usize, index: usize },
    Action(usize),
    ActionParameter { action: usize, index: usize },
    /// An annotation registered by the object map builder whose value has not
    /// been converted yet. `list` indexes the flattened annotation lists.
    RawAnnotation { list: usize, index: usize },
    Annotation(AnnotationId),
    Record(RecordId),
}

impl Target {
    pub fn kind(&self) -> ElementKind {
        match self {
            Target::EntityContainer => ElementKind::EntityContainer,
            Target::EntitySet(_) => ElementKind::EntitySet,
            Target::EntityType(_) => ElementKind::EntityType,
            Target::Property { .. } => ElementKind::Property,
            Target::NavigationProperty { .. } => ElementKind::NavigationProperty,
            Target::Action(_) => ElementKind::Action,
            Target::ActionParameter { .. } => ElementKind::ActionParameter,
            Target::RawAnnotation { .. } => ElementKind::RawAnnotation,
            Target::Annotation(_) => ElementKind::Annotation,
            Target::Record(_) => ElementKind::Record,
        }
    }

    /// Whether annotations can be attached to this target.
    pub fn is_annotatable(&self) -> bool {
        !matches!(self, Target::RawAnnotation { .. })
    }
}

// ---------------------------------------------------------------------------
// Annotation namespace
// ---------------------------------------------------------------------------

/// The `annotations` namespace every annotatable thing exposes.
///
/// Annotations are reachable both per vocabulary (`UI` -> `LineItem#Q`) and
/// through the flat key `UI.LineItem#Q`. Both views always hold the same id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationNamespace {
    vocabularies: BTreeMap<String, BTreeMap<String, AnnotationId>>,
    flat: BTreeMap<String, AnnotationId>,
}

impl AnnotationNamespace {
    /// Registers `id` under `vocabulary` / `term_key` and under the flat key.
    pub fn insert(&mut self, vocabulary: &str, term_key: &str, id: AnnotationId) {
        self.flat.insert(format!("{vocabulary}.{term_key}"), id);
        self.vocabularies
            .entry(vocabulary.to_string())
            .or_default()
            .insert(term_key.to_string(), id);
    }

    /// Looks up `annotations[vocabulary][term_key]`.
    pub fn get(&self, vocabulary: &str, term_key: &str) -> Option<AnnotationId> {
        self.vocabularies.get(vocabulary)?.get(term_key).copied()
    }

    /// Looks up `annotations._annotations[key]`.
    pub fn get_flat(&self, key: &str) -> Option<AnnotationId> {
        self.flat.get(key).copied()
    }

    /// All terms attached under one vocabulary bucket.
    pub fn vocabulary(&self, vocabulary: &str) -> Option<&BTreeMap<String, AnnotationId>> {
        self.vocabularies.get(vocabulary)
    }

    pub fn flat(&self) -> &BTreeMap<String, AnnotationId> {
        &self.flat
    }

    pub fn len(&self) -> usize {
        self.flat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flat.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Parser output
// ---------------------------------------------------------------------------

/// The parsed metadata document handed over by the CSDL parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParserOutput {
    #[serde(default)]
    pub references: Vec<Reference>,
    pub schema: Schema,
}

/// A vocabulary reference: `alias` abbreviates `namespace` in qualified names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub alias: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub namespace: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub entity_container: Option<EntityContainer>,
    #[serde(default)]
    pub entity_sets: Vec<EntitySet>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub entity_types: Vec<EntityType>,
    #[serde(default)]
    pub associations: Vec<Association>,
    /// Annotation lists keyed by the document they were declared in.
    #[serde(default)]
    pub annotations: BTreeMap<String, Vec<AnnotationList>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityContainer {
    pub name: String,
    pub fully_qualified_name: String,
    #[serde(skip)]
    pub annotations: AnnotationNamespace,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySet {
    pub name: String,
    pub fully_qualified_name: String,
    /// Fully qualified name of the entity type.
    pub entity_type: String,
    #[serde(skip)]
    pub entity_type_instance: Option<usize>,
    #[serde(skip)]
    pub annotations: AnnotationNamespace,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityType {
    pub name: String,
    pub fully_qualified_name: String,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub entity_properties: Vec<Property>,
    #[serde(default)]
    pub navigation_properties: Vec<NavigationProperty>,
    /// Bound actions, keyed by bare name and by namespace-qualified name.
    #[serde(skip)]
    pub actions: BTreeMap<String, usize>,
    #[serde(skip)]
    pub annotations: AnnotationNamespace,
}

impl EntityType {
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.entity_properties.iter().find(|p| p.name == name)
    }

    pub fn navigation_property(&self, name: &str) -> Option<&NavigationProperty> {
        self.navigation_properties.iter().find(|n| n.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub name: String,
    pub fully_qualified_name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub nullable: Option<bool>,
    #[serde(skip)]
    pub annotations: AnnotationNamespace,
}

/// A navigation property in either dialect.
///
/// V4 metadata names the target directly (`target_type_name`); V2 metadata
/// goes through an association (`relationship`) and the role at the far end
/// (`to_role`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationProperty {
    pub name: String,
    pub fully_qualified_name: String,
    #[serde(default)]
    pub target_type_name: Option<String>,
    #[serde(default)]
    pub relationship: Option<String>,
    #[serde(default)]
    pub from_role: Option<String>,
    #[serde(default)]
    pub to_role: Option<String>,
    #[serde(default)]
    pub is_collection: bool,
    #[serde(skip)]
    pub target_type: Option<usize>,
    #[serde(skip)]
    pub annotations: AnnotationNamespace,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub name: String,
    pub fully_qualified_name: String,
    #[serde(default)]
    pub is_bound: bool,
    #[serde(default)]
    pub is_function: bool,
    /// Type of the binding parameter for bound actions.
    #[serde(default)]
    pub source_type: String,
    #[serde(default)]
    pub return_type: String,
    #[serde(default)]
    pub parameters: Vec<ActionParameter>,
    #[serde(skip)]
    pub source_entity_type: Option<usize>,
    #[serde(skip)]
    pub return_entity_type: Option<usize>,
    #[serde(skip)]
    pub annotations: AnnotationNamespace,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionParameter {
    pub name: String,
    pub fully_qualified_name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub is_entity_set: bool,
    #[serde(skip)]
    pub annotations: AnnotationNamespace,
}

/// A V2 association between two entity types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Association {
    pub name: String,
    pub fully_qualified_name: String,
    #[serde(default)]
    pub association_end: Vec<AssociationEnd>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationEnd {
    pub role: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub multiplicity: String,
}

// ---------------------------------------------------------------------------
// Raw annotations
// ---------------------------------------------------------------------------

/// Annotations declared against one target path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationList {
    pub target: String,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

/// A raw annotation as produced by the parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub term: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<RecordExpr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<CollectionExpr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Expression>,
    #[serde(default)]
    pub is_collection: bool,
}

/// A raw CSDL expression, tagged by `type` with the payload under a key of
/// the same name: `{"type": "Path", "Path": "Currency"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expression {
    String {
        #[serde(rename = "String")]
        value: String,
    },
    Int {
        #[serde(rename = "Int")]
        value: i64,
    },
    Bool {
        #[serde(rename = "Bool")]
        value: bool,
    },
    /// Kept as text. Accepts a JSON string or number.
    Decimal {
        #[serde(rename = "Decimal", deserialize_with = "decimal_literal")]
        value: String,
    },
    Date {
        #[serde(rename = "Date")]
        value: String,
    },
    EnumMember {
        #[serde(rename = "EnumMember")]
        value: String,
    },
    Apply {
        #[serde(rename = "Apply")]
        value: serde_json::Value,
    },
    Path {
        #[serde(rename = "Path")]
        value: String,
    },
    PropertyPath {
        #[serde(rename = "PropertyPath")]
        value: String,
    },
    NavigationPropertyPath {
        #[serde(rename = "NavigationPropertyPath")]
        value: String,
    },
    AnnotationPath {
        #[serde(rename = "AnnotationPath")]
        value: String,
    },
    Record {
        #[serde(rename = "Record")]
        value: RecordExpr,
    },
    Collection {
        #[serde(rename = "Collection")]
        value: CollectionExpr,
    },
}

impl Expression {
    /// The `type` tag of this expression.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expression::String { .. } => "String",
            Expression::Int { .. } => "Int",
            Expression::Bool { .. } => "Bool",
            Expression::Decimal { .. } => "Decimal",
            Expression::Date { .. } => "Date",
            Expression::EnumMember { .. } => "EnumMember",
            Expression::Apply { .. } => "Apply",
            Expression::Path { .. } => "Path",
            Expression::PropertyPath { .. } => "PropertyPath",
            Expression::NavigationPropertyPath { .. } => "NavigationPropertyPath",
            Expression::AnnotationPath { .. } => "AnnotationPath",
            Expression::Record { .. } => "Record",
            Expression::Collection { .. } => "Collection",
        }
    }
}

fn decimal_literal<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Literal {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Literal::deserialize(deserializer)? {
        Literal::Text(text) => text,
        Literal::Number(number) => number.to_string(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordExpr {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub record_type: Option<String>,
    #[serde(default)]
    pub property_values: Vec<PropertyValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyValue {
    pub name: String,
    pub value: Expression,
}

/// A collection expression. The element kind travels beside the items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionExpr {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub items: Vec<Expression>,
}
