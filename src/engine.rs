use crate::config::{ModelParams, SimulationConfig, TeachingPolicy};
use crate::model::{AgentState, Group, Trajectories, TrajectoryMatrix};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::StandardNormal;

/// Advance one agent by a single timestep.
///
/// The result depends only on `state`, `params` and the draws taken from
/// `rng`, so a deterministic random source reproduces the same transition.
/// Exactly one standard normal draw is consumed per call.
pub fn advance<R: Rng + ?Sized>(state: &AgentState, params: &ModelParams, rng: &mut R) -> AgentState {
    let z: f64 = rng.sample(StandardNormal);

    // Agitation widens the noise, perspective narrows its variance.
    let std_dev = params.noise_std * (1.0 + params.emotional_impact * state.emotion.abs())
        / (1.0 + params.perspective_damping * state.perspective).sqrt();
    let raw = z * std_dev;

    let weight = state.theory_weight();
    let rational = params.rational_drift + params.perspective_strength * state.perspective;
    let decision = ((1.0 - weight) * raw + weight * rational)
        .clamp(-params.decision_bound, params.decision_bound);

    let decay = (params.emotion_decay * (1.0 + state.understanding.clamp(0.0, 1.0))).min(1.0);
    let emotion =
        ((1.0 - decay) * state.emotion + params.emotional_sensitivity * z).clamp(-1.0, 1.0);

    // Control agents never gain perspective on their own.
    let perspective = match state.group {
        Group::TheoryAware => {
            state.perspective + params.perspective_gain * state.application.clamp(0.0, 1.0)
        }
        Group::Control => state.perspective,
    };

    AgentState {
        value: state.value + decision,
        emotion,
        perspective,
        ..*state
    }
}

/// Simulation engine.
///
/// Holds the configuration, both populations, and the random number generator
/// shared by initialization, teaching and agent updates.
pub struct Engine {
    cfg: SimulationConfig,
    seed: u64,
    aware: Vec<AgentState>,
    control: Vec<AgentState>,
    rng: ChaCha12Rng,
}

impl Engine {
    /// Create a new `Engine` with both populations in their initial state.
    ///
    /// Without a configured seed a fresh one is drawn from entropy; it is
    /// logged and stored so the run can be repeated.
    pub fn new(cfg: SimulationConfig) -> Self {
        let seed = cfg.seed().unwrap_or_else(|| rand::rng().random());
        let mut rng = ChaCha12Rng::seed_from_u64(seed);

        let n_agt = cfg.n_individuals();
        let emotion_std = cfg.model().initial_emotion_std;
        let mut init_agents = |group: Group, understanding: f64, application: f64| {
            (0..n_agt)
                .map(|_| {
                    let z: f64 = rng.sample(StandardNormal);
                    AgentState::new(group, z * emotion_std, understanding, application)
                })
                .collect::<Vec<_>>()
        };
        let aware = init_agents(
            Group::TheoryAware,
            cfg.theory_understanding(),
            cfg.theory_application(),
        );
        let control = init_agents(Group::Control, 0.0, 0.0);

        Self {
            cfg,
            seed,
            aware,
            control,
            rng,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Current state of every agent in `group`.
    pub fn agents(&self, group: Group) -> &[AgentState] {
        match group {
            Group::TheoryAware => &self.aware,
            Group::Control => &self.control,
        }
    }

    /// Perform every configured timestep and collect both trajectory matrices.
    pub fn run(mut self) -> Trajectories {
        let n_agt = self.cfg.n_individuals();
        let n_steps = self.cfg.n_timesteps();
        log::info!(
            "simulating {n_steps} steps with {n_agt} agents per group (seed {})",
            self.seed
        );

        let mut theory_aware = TrajectoryMatrix::new(n_agt, n_steps);
        let mut control = TrajectoryMatrix::new(n_agt, n_steps);

        let steps_per_log = (n_steps / 10).max(1);
        for i_step in 0..n_steps {
            self.step();

            theory_aware.push_row(self.aware.iter().map(AgentState::value));
            control.push_row(self.control.iter().map(AgentState::value));

            if (i_step + 1) % steps_per_log == 0 || i_step + 1 == n_steps {
                let progress = 100.0 * (i_step + 1) as f64 / n_steps as f64;
                log::info!("completed {progress:06.2}%");
            }
        }

        Trajectories {
            seed: self.seed,
            theory_aware,
            control,
        }
    }

    /// Perform a single timestep: the teaching pass, then every agent update.
    ///
    /// Returns the number of successful teaching events.
    pub fn step(&mut self) -> usize {
        let n_taught = teaching_pass(&mut self.aware, &mut self.control, &self.cfg, &mut self.rng);
        log::debug!("{n_taught} teaching events");

        let model = self.cfg.model();
        for agt in self.aware.iter_mut().chain(self.control.iter_mut()) {
            *agt = advance(agt, model, &mut self.rng);
        }

        n_taught
    }
}

/// Run a complete simulation for `cfg`.
pub fn run(cfg: &SimulationConfig) -> Trajectories {
    Engine::new(cfg.clone()).run()
}

/// Let theory-aware agents teach, returning the number of successful events.
///
/// Every decision (who teaches, whom, whether the target is receptive) is
/// taken from the pre-step state before any mutation is applied, so an agent
/// taught during this pass cannot influence who else gets taught.
fn teaching_pass<R: Rng + ?Sized>(
    aware: &mut [AgentState],
    control: &mut [AgentState],
    cfg: &SimulationConfig,
    rng: &mut R,
) -> usize {
    let model = cfg.model();
    let prob_base = cfg.teaching_probability().clamp(0.0, 1.0);

    let mut targets = Vec::new();
    for (i_src, src) in aware.iter().enumerate() {
        // Agitated agents teach less effectively.
        let confidence = (1.0 - src.emotion.abs()).clamp(0.0, 1.0);
        if !rng.random_bool(prob_base * confidence) {
            continue;
        }

        match model.teaching_policy {
            TeachingPolicy::CrossGroup => {
                if control.is_empty() {
                    continue;
                }
                let i_tgt = rng.random_range(0..control.len());
                if control[i_tgt].emotion.abs() < model.receptiveness_threshold {
                    targets.push(i_tgt);
                }
            }
            TeachingPolicy::WithinGroup => {
                if aware.len() < 2 {
                    continue;
                }
                // Uniform over every aware agent except the source.
                let mut i_tgt = rng.random_range(0..aware.len() - 1);
                if i_tgt >= i_src {
                    i_tgt += 1;
                }
                targets.push(i_tgt);
            }
        }
    }

    match model.teaching_policy {
        TeachingPolicy::CrossGroup => {
            let max_understanding = cfg.theory_understanding().clamp(0.0, 1.0);
            let max_application = cfg.theory_application().clamp(0.0, 1.0);
            for &i_tgt in &targets {
                let tgt = &mut control[i_tgt];
                tgt.understanding =
                    raise_toward(tgt.understanding, model.understanding_increment, max_understanding);
                tgt.application =
                    raise_toward(tgt.application, model.application_increment, max_application);
            }
        }
        TeachingPolicy::WithinGroup => {
            for &i_tgt in &targets {
                aware[i_tgt].perspective += model.perspective_boost;
            }
        }
    }

    targets.len()
}

/// Move `val` up by at most `inc` without passing `max`; never moves it down.
fn raise_toward(val: f64, inc: f64, max: f64) -> f64 {
    if val >= max {
        val
    } else {
        (val + inc).min(max)
    }
}
