use derive_builder::Builder;

/// Where compiled render graphs run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExecutionMode {
    /// A dedicated worker thread consumes graphs in submission order.
    #[default]
    Multithreaded,
    /// Graphs run synchronously on the submitting thread.
    Singlethreaded,
}

#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(default)]
pub struct RenderGraphConfig {
    /// Reuse surrendered transient resources with an equal description.
    pub enable_memory_aliasing: bool,
    /// Panic on contract violations (undeclared access, missing blackboard entry, ...).
    pub fatal_contract_violations: bool,
    pub execution_mode: ExecutionMode,
}

impl Default for RenderGraphConfig {
    fn default() -> Self {
        Self {
            enable_memory_aliasing: true,
            fatal_contract_violations: cfg!(debug_assertions),
            execution_mode: ExecutionMode::default(),
        }
    }
}

impl RenderGraphConfig {
    pub const MEMORY_ALIASING_ENV: &'static str = "ZENITH_RG_MEMORY_ALIASING";
    pub const EXECUTION_MODE_ENV: &'static str = "ZENITH_RG_EXECUTION_MODE";
    pub const FATAL_VALIDATION_ENV: &'static str = "ZENITH_RG_FATAL_VALIDATION";

    /// Default config overridden by the `ZENITH_RG_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(value) = lookup(Self::MEMORY_ALIASING_ENV).and_then(|value| parse_flag(&value)) {
            config.enable_memory_aliasing = value;
        }
        if let Some(value) = lookup(Self::FATAL_VALIDATION_ENV).and_then(|value| parse_flag(&value)) {
            config.fatal_contract_violations = value;
        }
        if let Some(value) = lookup(Self::EXECUTION_MODE_ENV) {
            match value.trim().to_ascii_lowercase().as_str() {
                "multi" | "multithreaded" => config.execution_mode = ExecutionMode::Multithreaded,
                "single" | "singlethreaded" => config.execution_mode = ExecutionMode::Singlethreaded,
                other => log::warn!("Unknown execution mode [{other}] in {}", Self::EXECUTION_MODE_ENV),
            }
        }

        config
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        other => {
            log::warn!("Ignore invalid flag value [{other}]");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_overrides_defaults() {
        let config = RenderGraphConfig::from_lookup(|key| match key {
            RenderGraphConfig::MEMORY_ALIASING_ENV => Some("0".to_owned()),
            RenderGraphConfig::EXECUTION_MODE_ENV => Some("Single".to_owned()),
            _ => None,
        });

        assert!(!config.enable_memory_aliasing);
        assert_eq!(config.execution_mode, ExecutionMode::Singlethreaded);
        assert_eq!(config.fatal_contract_violations, cfg!(debug_assertions));
    }

    #[test]
    fn invalid_values_keep_defaults() {
        let config = RenderGraphConfig::from_lookup(|key| match key {
            RenderGraphConfig::MEMORY_ALIASING_ENV => Some("maybe".to_owned()),
            _ => None,
        });
        assert!(config.enable_memory_aliasing);
    }

    #[test]
    fn builder_keeps_unset_fields() {
        let config = RenderGraphConfigBuilder::default()
            .fatal_contract_violations(false)
            .build()
            .unwrap();

        assert!(config.enable_memory_aliasing);
        assert!(!config.fatal_contract_violations);
    }
}
