//! Built-in tool implementations for Cogwork.
//!
//! These give the reasoning loop something to act with out of the box:
//! expression evaluation, echoing (useful for wiring tests), and a canned
//! weather lookup for exercising the loop end-to-end without network
//! access.

pub mod echo;
pub mod math;
pub mod weather_lookup;

use cogwork_core::tool::ToolRegistry;

pub use echo::EchoTool;
pub use math::MathTool;
pub use weather_lookup::WeatherLookupTool;

/// Create a registry with all built-in tools.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(MathTool));
    registry.register(Box::new(EchoTool));
    registry.register(Box::new(WeatherLookupTool));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_contains_all_tools() {
        let registry = default_registry();
        assert_eq!(registry.names(), vec!["echo", "math", "weather_lookup"]);
    }
}
