//! Fluent builder for constructing a [`Sim`].

use dim_agent::{AgentRegistry, DecisionBook};
use dim_core::{SimConfig, SimRng};
use dim_lane::LaneNetwork;
use dim_world::WorldState;

use crate::{Sim, SimResult};

/// Fluent builder for [`Sim<W>`].
///
/// # Optional inputs (have defaults)
///
/// | Method       | Default         |
/// |--------------|-----------------|
/// | `.seed(s)`   | `config.seed`   |
///
/// # Example
///
/// ```rust,ignore
/// let mut sim = SimBuilder::new(config, world).seed(7).build()?;
/// sim.run(&mut NoopObserver);
/// ```
pub struct SimBuilder<W: WorldState> {
    config: SimConfig,
    world:  W,
    seed:   Option<u64>,
}

impl<W: WorldState> SimBuilder<W> {
    pub fn new(config: SimConfig, world: W) -> Self {
        Self { config, world, seed: None }
    }

    /// Override the tie-break seed from the config.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate the configuration, discover the lane network and return a
    /// ready-to-run [`Sim`].
    pub fn build(mut self) -> SimResult<Sim<W>> {
        if let Some(seed) = self.seed {
            self.config.seed = seed;
        }
        self.config.validate()?;
        let lanes = LaneNetwork::from_world(&self.world, &self.config.protocol)?;

        Ok(Sim {
            clock:     self.config.make_clock(),
            rng:       SimRng::new(self.config.seed),
            config:    self.config,
            world:     self.world,
            agents:    AgentRegistry::new(),
            lanes,
            decisions: DecisionBook::new(),
        })
    }
}
