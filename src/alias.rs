use crate::types::Reference;

/// Expands and recovers vocabulary aliases.
///
/// Built from the document's references, the schema's own alias and any
/// aliases supplied through configuration. Later entries win when two
/// references declare the same alias.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: Vec<Reference>,
}

/// Where an annotation lands in an `AnnotationNamespace`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermKey {
    /// Vocabulary bucket: the alias if one is known, otherwise the namespace.
    pub vocabulary: String,
    /// Term name plus `#qualifier` when qualified.
    pub term_key: String,
    /// Fully qualified term, e.g. `com.sap.vocabularies.UI.v1.LineItem`.
    pub term: String,
}

impl AliasTable {
    pub fn new(references: impl IntoIterator<Item = Reference>) -> Self {
        let mut entries: Vec<Reference> = Vec::new();
        for reference in references {
            entries.retain(|r| r.alias != reference.alias);
            entries.push(reference);
        }
        Self { entries }
    }

    /// Rewrites every `Alias.` prefix in a qualified name or path.
    ///
    /// Each `@`-separated part and each `/`-separated segment inside it is
    /// checked, so `Order/@UI.LineItem` and `UI.Facets/0` both expand.
    pub fn unalias(&self, value: &str) -> String {
        if self.entries.is_empty() || value.is_empty() {
            return value.to_string();
        }
        value
            .split('@')
            .map(|part| {
                part.split('/')
                    .map(|segment| self.unalias_segment(segment))
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .collect::<Vec<_>>()
            .join("@")
    }

    /// Returns the alias declared for `namespace`, if any.
    pub fn alias_of(&self, namespace: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|r| r.namespace == namespace)
            .map(|r| r.alias.as_str())
    }

    /// Computes where an annotation of `term` lands.
    pub fn term_key(&self, term: &str, qualifier: Option<&str>) -> TermKey {
        let full = self.unalias(term);
        let (namespace, name) = match full.rfind('.') {
            Some(idx) => (&full[..idx], &full[idx + 1..]),
            None => ("", full.as_str()),
        };
        let vocabulary = self.alias_of(namespace).unwrap_or(namespace).to_string();
        let term_key = match qualifier {
            Some(q) if !q.is_empty() => format!("{name}#{q}"),
            _ => name.to_string(),
        };
        TermKey {
            vocabulary,
            term_key,
            term: full,
        }
    }

    /// Builds the object map key of an annotation: `target@term[#qualifier]`.
    /// `target` must already be unaliased; the term is unaliased here.
    pub fn annotation_fqn(&self, target: &str, term: &str, qualifier: Option<&str>) -> String {
        let mut fqn = format!("{}@{}", target, self.unalias(term));
        if let Some(q) = qualifier.filter(|q| !q.is_empty()) {
            fqn.push('#');
            fqn.push_str(q);
        }
        fqn
    }

    fn unalias_segment(&self, segment: &str) -> String {
        for reference in self.entries.iter().rev() {
            if let Some(rest) = segment
                .strip_prefix(reference.alias.as_str())
                .and_then(|r| r.strip_prefix('.'))
            {
                return format!("{}.{}", reference.namespace, rest);
            }
        }
        segment.to_string()
    }
}
