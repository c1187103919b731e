//! Tool declarations offered to the model.
//!
//! Declarations are a pure projection of the registry: one per operation of
//! each ready provider, in registration order then declaration order. Nothing
//! here calls a provider, so building the list twice yields the same result.

use crate::ToolDef;
use crate::provider::ProviderRegistry;

/// Build the tool list for the ready providers in `registry`.
///
/// An empty result means tool use is disabled for the conversation.
pub fn build_tool_declarations(registry: &ProviderRegistry) -> Vec<ToolDef> {
    registry
        .ready()
        .flat_map(|p| p.operations().iter().map(|op| op.to_tool_def()))
        .collect()
}
