//! Row types and enum mappings.

pub mod deployment;
pub mod template;

pub use deployment::{DeploymentRow, DeployedAgentRow};
pub use template::{AgentTemplateRow, AssociationRow, BlockTemplateRow, TemplateRow};
