//! Timetable adjustment proposals from stop-pair statistics.
//!
//! [`ScheduleModel::build`] turns [`StopPairStat`] rows into a linear program
//! with one signed adjustment (minutes) per stop. [`ScheduleOptimizer`] wraps
//! the build/solve pair with an explicit lifecycle for callers that keep the
//! model around between the two calls.

pub mod lp;
pub mod simplex;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::pipeline::types::StopPairStat;
use lp::{Bounds, LinearExpr, LinearProgram, LinearProgramBuilder, LpBackend, Relation, Sense};
pub use lp::{SolveLimits, SolveStatus};
pub use simplex::DenseSimplex;

/// Tunables for the schedule program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptimizerSettings {
    /// Largest shift, in minutes, proposed for any single stop.
    pub max_adjustment_per_stop: f64,
    /// Fraction of the scheduled segment time that spacing may not drop below.
    pub min_spacing_ratio: f64,
    /// Cap on the summed adjustments, as a fraction of total scheduled time.
    pub max_total_drift_ratio: f64,
    pub max_iterations: Option<usize>,
    pub time_limit_seconds: Option<u64>,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            max_adjustment_per_stop: 30.0,
            min_spacing_ratio: 0.8,
            max_total_drift_ratio: 0.1,
            max_iterations: Some(10_000),
            time_limit_seconds: None,
        }
    }
}

impl OptimizerSettings {
    pub fn limits(&self) -> SolveLimits {
        SolveLimits {
            max_iterations: self.max_iterations,
            time_limit: self.time_limit_seconds.map(Duration::from_secs),
        }
    }
}

/// Result of a schedule solve. `adjustments` is only populated when the
/// status is [`SolveStatus::Optimal`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSolution {
    pub status: SolveStatus,
    pub objective: Option<f64>,
    pub adjustments: BTreeMap<String, f64>,
    pub iterations: usize,
}

/// An immutable schedule program ready to be solved by any [`LpBackend`].
#[derive(Debug, Clone)]
pub struct ScheduleModel {
    program: LinearProgram,
    stops: BTreeMap<String, lp::VarId>,
}

impl ScheduleModel {
    /// Builds the program:
    ///
    /// - `adj[stop]` in `[-max, max]` for every stop named in `stats`;
    /// - minimise `Σ travel_time_avg × min(1, count / mean count)`;
    /// - `adj[next] - adj[stop] >= min_spacing_ratio × scheduled_time_avg`;
    /// - `Σ adj <= max_total_drift_ratio × Σ scheduled_time_avg`.
    ///
    /// Pairs without a scheduled time add no spacing constraint and pairs
    /// without a travel time add nothing to the objective.
    #[tracing::instrument(skip(stats, settings), fields(pairs = stats.len()))]
    pub fn build(
        stats: &[StopPairStat],
        max_adjustment_per_stop: f64,
        settings: &OptimizerSettings,
    ) -> Result<Self> {
        if !(max_adjustment_per_stop.is_finite() && max_adjustment_per_stop > 0.0) {
            return Err(PipelineError::Config(format!(
                "max adjustment per stop must be positive, got {max_adjustment_per_stop}"
            )));
        }

        let names: BTreeSet<&str> = stats
            .iter()
            .flat_map(|s| [s.stop_name.as_str(), s.next_stop_name.as_str()])
            .collect();

        let mut builder = LinearProgramBuilder::new();
        let stops: BTreeMap<String, lp::VarId> = names
            .into_iter()
            .map(|name| {
                let var = builder.add_variable(
                    &format!("adj_{name}"),
                    Bounds::symmetric(max_adjustment_per_stop),
                );
                (name.to_string(), var)
            })
            .collect();

        let mean_count = if stats.is_empty() {
            0.0
        } else {
            stats.iter().map(|s| s.count as f64).sum::<f64>() / stats.len() as f64
        };

        let weighted_travel: f64 = stats
            .iter()
            .filter_map(|s| Some(s.travel_time_avg? * support_weight(s.count, mean_count)))
            .sum();
        builder.set_objective(Sense::Minimize, LinearExpr::constant(weighted_travel));

        let mut total_scheduled = 0.0;
        for stat in stats {
            let Some(scheduled) = stat.scheduled_time_avg else {
                continue;
            };
            total_scheduled += scheduled;

            let spacing = LinearExpr::new()
                .term(stops[&stat.next_stop_name], 1.0)
                .term(stops[&stat.stop_name], -1.0);
            builder.add_constraint(
                spacing,
                Relation::GreaterOrEqual,
                settings.min_spacing_ratio * scheduled,
            );
        }

        let drift: LinearExpr = stops.values().map(|&var| (var, 1.0)).collect();
        builder.add_constraint(
            drift,
            Relation::LessOrEqual,
            settings.max_total_drift_ratio * total_scheduled,
        );

        let program = builder.build()?;
        debug!(
            stops = stops.len(),
            mean_count,
            weighted_travel,
            total_scheduled,
            "Schedule model built"
        );

        Ok(Self { program, stops })
    }

    pub fn program(&self) -> &LinearProgram {
        &self.program
    }

    /// Stop names in variable order.
    pub fn stops(&self) -> impl Iterator<Item = &str> {
        self.stops.keys().map(String::as_str)
    }

    #[tracing::instrument(skip_all, fields(stops = self.stops.len()))]
    pub fn solve<B: LpBackend + ?Sized>(&self, backend: &B, limits: &SolveLimits) -> ScheduleSolution {
        let solution = backend.solve(&self.program, limits);

        let adjustments = if solution.status == SolveStatus::Optimal {
            self.stops
                .iter()
                .filter_map(|(name, &var)| {
                    let value = solution.value(var)?;
                    debug!(variable = self.program.name(var), value, "Stop adjustment");
                    Some((name.clone(), value))
                })
                .collect()
        } else {
            BTreeMap::new()
        };

        match solution.status {
            SolveStatus::Optimal => info!(
                objective = ?solution.objective,
                iterations = solution.iterations,
                "Optimal schedule adjustment found"
            ),
            status => warn!(?status, iterations = solution.iterations, "No optimal schedule adjustment"),
        }

        ScheduleSolution {
            status: solution.status,
            objective: solution.objective,
            adjustments,
            iterations: solution.iterations,
        }
    }
}

/// `min(1, count / mean_count)`, or zero when no pair has support.
pub fn support_weight(count: usize, mean_count: f64) -> f64 {
    if mean_count <= 0.0 {
        return 0.0;
    }
    (count as f64 / mean_count).min(1.0)
}

/// Lifecycle of a [`ScheduleOptimizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerState {
    Empty,
    Built,
    Solved,
    Failed,
}

/// Holds a built model between `build` and `solve`.
///
/// `solve` without a prior `build` is a usage error, while a non-optimal
/// solver outcome is reported through [`ScheduleSolution::status`] and moves
/// the optimizer to [`OptimizerState::Failed`].
pub struct ScheduleOptimizer<B = DenseSimplex> {
    backend: B,
    settings: OptimizerSettings,
    model: Option<ScheduleModel>,
    state: OptimizerState,
}

impl ScheduleOptimizer<DenseSimplex> {
    pub fn new(settings: OptimizerSettings) -> Self {
        Self::with_backend(DenseSimplex, settings)
    }
}

impl<B: LpBackend> ScheduleOptimizer<B> {
    pub fn with_backend(backend: B, settings: OptimizerSettings) -> Self {
        Self {
            backend,
            settings,
            model: None,
            state: OptimizerState::Empty,
        }
    }

    pub fn state(&self) -> OptimizerState {
        self.state
    }

    pub fn model(&self) -> Option<&ScheduleModel> {
        self.model.as_ref()
    }

    pub fn build(
        &mut self,
        stats: &[StopPairStat],
        max_adjustment_per_stop: f64,
    ) -> Result<&ScheduleModel> {
        self.model = None;
        self.state = OptimizerState::Empty;

        let model = ScheduleModel::build(stats, max_adjustment_per_stop, &self.settings)?;
        self.state = OptimizerState::Built;
        Ok(&*self.model.insert(model))
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::Solver`] if no model has been built.
    pub fn solve(&mut self) -> Result<ScheduleSolution> {
        let model = self.model.as_ref().ok_or_else(|| {
            PipelineError::Solver("model has not been built yet, call build() first".into())
        })?;

        let solution = model.solve(&self.backend, &self.settings.limits());
        self.state = if solution.status == SolveStatus::Optimal {
            OptimizerState::Solved
        } else {
            OptimizerState::Failed
        };
        Ok(solution)
    }
}
