//! Engine data models.

pub mod doc_type;
pub mod document;
pub mod language;
pub mod permission;
pub mod user;

pub use doc_type::{DocumentType, PropertyDefinition};
pub use document::{
    CultureSchedule, Document, VariantRequest, INVARIANT_CULTURE, RECYCLE_BIN_ID, ROOT_ID,
    culture_key,
};
pub use language::Language;
pub use permission::{PermissionCode, PermissionSet};
pub use user::UserContext;
