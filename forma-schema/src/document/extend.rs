//! Schema extension: layering patches on top of a base document.

use super::{SchemaDocument, deep_merge};

impl SchemaDocument {
    /// Apply a patch on top of this document.
    ///
    /// Properties present in both are merged key by key, so a patch that only
    /// adds `required: true` keeps the base `type`; relation keys (`$ref`,
    /// `references`) are replaced rather than merged. Required names are
    /// unioned in order, projections and defaults are overwritten per name and
    /// unknown keywords are merged recursively.
    pub fn extend(&mut self, patch: &SchemaDocument) {
        if patch.id.is_some() {
            self.id.clone_from(&patch.id);
        }
        if patch.kind.is_some() {
            self.kind = patch.kind;
        }

        for (name, property) in &patch.properties {
            match self.properties.get_mut(name) {
                Some(existing) => existing.merge(property),
                None => {
                    self.properties.insert(name.clone(), property.clone());
                }
            }
        }

        for name in &patch.required {
            if !self.required.contains(name) {
                self.required.push(name.clone());
            }
        }

        for (name, spec) in &patch.projection {
            self.projection.insert(name.clone(), spec.clone());
        }

        if patch.default_projection_options.is_some() {
            self.default_projection_options
                .clone_from(&patch.default_projection_options);
        }

        for (name, value) in &patch.defaults {
            self.defaults.insert(name.clone(), value.clone());
        }

        for (key, value) in &patch.extra {
            match self.extra.get_mut(key) {
                Some(existing) => deep_merge(existing, value),
                None => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }
    }

    /// Return a copy of this document with the patch applied.
    pub fn extended(&self, patch: &SchemaDocument) -> Self {
        let mut doc = self.clone();
        doc.extend(patch);
        doc
    }

    /// Apply several patches in order.
    pub fn extend_all<'a>(
        base: &SchemaDocument,
        patches: impl IntoIterator<Item = &'a SchemaDocument>,
    ) -> Self {
        patches
            .into_iter()
            .fold(base.clone(), |doc, patch| doc.extended(patch))
    }
}
