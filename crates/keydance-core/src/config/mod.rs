// Keydance Config API
// Declarative engine setup loaded from TOML

pub mod parser;

pub use parser::{BehaviorKind, Config, ConfigError, ConfigToml, KeySpec};

use crate::engine::Engine;
use crate::sim::{Simulator, VirtualHost};

impl Config {
    /// Build an engine from this configuration
    pub fn build_engine(&self) -> Engine {
        Engine::new(self.engine.clone())
    }

    /// Build a virtual host carrying this configuration's layers and behaviors
    pub fn build_host(&self) -> VirtualHost {
        VirtualHost::new(self.layers.clone()).with_behaviors(self.behaviors.clone())
    }

    /// Engine and host wired together
    pub fn build_simulator(&self) -> Simulator {
        Simulator::new(self.build_engine(), self.build_host())
    }
}
