//! Declarative design specs: markdown documents with pillars, checks,
//! inheritance, and overrides.

mod loader;
mod model;
mod parser;

pub use loader::{LoadedSpec, SpecLoader};
pub use model::{
    config_f64, config_str, Check, CheckConfig, ConfigValue, OverrideEntry, Pillar, Spec,
    SpecDocument,
};
pub use parser::parse_spec_markdown;
