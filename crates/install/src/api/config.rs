use cpkg_types::{BehaviourOptions, InstallMode, MergeMode};

/// Engine configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Decision used when no resolver is injected
    pub default_behaviour: BehaviourOptions,
    /// Hard stop for the pass loop; `None` relies on the progress check alone
    pub max_passes: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_behaviour: BehaviourOptions::new(InstallMode::Merge, MergeMode::Clear),
            max_passes: None,
        }
    }
}

impl EngineConfig {
    /// Set the fallback conflict decision
    #[must_use]
    pub fn with_default_behaviour(mut self, behaviour: BehaviourOptions) -> Self {
        self.default_behaviour = behaviour;
        self
    }

    /// Bound the number of passes
    #[must_use]
    pub fn with_max_passes(mut self, passes: usize) -> Self {
        self.max_passes = Some(passes);
        self
    }
}
