//! Engine settings shared by the commands that flow documents.

use std::time::Duration;

use stubflow::Engine;

/// Limits applied while flowing.
#[derive(Debug, Clone, clap::Args)]
pub struct EngineArgs {
    /// Passes after which a flow gives up without reaching a fixpoint
    #[arg(long, env = "STUBFLOW_MAX_PASSES", default_value_t = 256)]
    pub max_passes: usize,

    /// Seconds `sync` waits for its condition
    #[arg(long, default_value_t = 300)]
    pub sync_timeout: u64,
}

impl EngineArgs {
    /// Build an engine with these limits and the standard registries.
    pub fn engine(&self, partial: bool) -> Engine {
        Engine::builder()
            .max_passes(self.max_passes)
            .sync_timeout(Duration::from_secs(self.sync_timeout))
            .partial(partial)
            .build()
    }
}
