//! Catalog construction errors

/// Errors raised while building a [`FieldCatalog`](crate::FieldCatalog)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// Two rows in one module share a field id
    #[error("duplicate field id {field_id} in module {module}")]
    DuplicateFieldId {
        /// Module holding both rows
        module: String,
        /// Repeated id
        field_id: String,
    },

    /// Row without a module name
    #[error("catalog entry '{api_name}' has no module")]
    MissingModule {
        /// API name of the offending row
        api_name: String,
    },
}
