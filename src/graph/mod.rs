/// Fully-qualified-name registry and its builder.
pub mod object_map;

/// Arenas holding converted annotation values.
pub mod store;

pub use object_map::{build_object_map, flatten_annotations, normalize_target, ObjectMap};
pub use store::{
    AnnotationStore, Record, ReferenceExpression, ReferenceTarget, ResolvedAnnotation, Value,
};
