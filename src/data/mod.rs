pub mod catalog;
pub mod ship;
pub mod validate;

pub use catalog::{
    load_catalog, load_catalog_file, AbilityDef, Catalog, CatalogFile, CounterEntry,
    FormationDef, GemDef, PostureDef,
};
pub use ship::ShipSpec;
pub use validate::{validate_catalog_file, ValidationDiagnostic, ValidationReport, ValidationSeverity};
