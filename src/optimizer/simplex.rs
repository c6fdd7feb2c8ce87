//! Dense two-phase tableau simplex.
//!
//! Suited to the small programs produced by the schedule optimizer (one
//! variable per stop). Bland's rule is used for both entering and leaving
//! choices, so degenerate problems cannot cycle.

use std::time::Instant;
use tracing::debug;

use super::lp::{Bounds, LinearProgram, LpBackend, LpSolution, Relation, Sense, SolveLimits, SolveStatus};

const EPS: f64 = 1e-9;

/// How an original variable maps onto non-negative tableau columns.
#[derive(Debug, Clone, Copy)]
enum Column {
    /// `x = offset + y`
    Shifted { col: usize, offset: f64 },
    /// `x = offset - y`
    Mirrored { col: usize, offset: f64 },
    /// `x = y⁺ - y⁻`
    Split { pos: usize, neg: usize },
}

/// Bundled pure-Rust backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenseSimplex;

impl LpBackend for DenseSimplex {
    #[tracing::instrument(skip_all, fields(variables = program.num_variables(), constraints = program.constraints().len()))]
    fn solve(&self, program: &LinearProgram, limits: &SolveLimits) -> LpSolution {
        let (columns, structural) = map_columns(program.bounds());
        let rows = standard_rows(program, &columns, structural);

        // objective over structural columns, always minimised
        let flip = if program.sense() == Sense::Maximize { -1.0 } else { 1.0 };
        let mut costs = vec![0.0; structural];
        for (var, coeff) in program.objective().terms() {
            match columns[var.index()] {
                Column::Shifted { col, .. } => costs[col] += flip * coeff,
                Column::Mirrored { col, .. } => costs[col] -= flip * coeff,
                Column::Split { pos, neg } => {
                    costs[pos] += flip * coeff;
                    costs[neg] -= flip * coeff;
                }
            }
        }

        let mut tableau = Tableau::new(rows, structural);
        let mut budget = Budget::new(limits);

        let phase_one: Vec<f64> = (0..tableau.width())
            .map(|j| if tableau.is_artificial(j) { 1.0 } else { 0.0 })
            .collect();
        let any_column = vec![true; tableau.width()];

        match tableau.run(&phase_one, &any_column, &mut budget) {
            Outcome::Optimal => {}
            Outcome::Timeout => return LpSolution::without_values(SolveStatus::Timeout, budget.iterations),
            // phase one is bounded below by zero
            Outcome::Unbounded => return LpSolution::without_values(SolveStatus::NotSolved, budget.iterations),
        }

        if tableau.objective_value(&phase_one) > EPS.sqrt() {
            debug!(iterations = budget.iterations, "Phase one left artificial infeasibility");
            return LpSolution::without_values(SolveStatus::Infeasible, budget.iterations);
        }

        tableau.drop_artificial_basis();

        let mut phase_two = vec![0.0; tableau.width()];
        phase_two[..structural].copy_from_slice(&costs);
        let real_columns: Vec<bool> = (0..tableau.width()).map(|j| !tableau.is_artificial(j)).collect();

        match tableau.run(&phase_two, &real_columns, &mut budget) {
            Outcome::Optimal => {}
            Outcome::Timeout => return LpSolution::without_values(SolveStatus::Timeout, budget.iterations),
            Outcome::Unbounded => return LpSolution::without_values(SolveStatus::Unbounded, budget.iterations),
        }

        let y = tableau.column_values();
        let values: Vec<f64> = columns
            .iter()
            .map(|c| match *c {
                Column::Shifted { col, offset } => offset + y[col],
                Column::Mirrored { col, offset } => offset - y[col],
                Column::Split { pos, neg } => y[pos] - y[neg],
            })
            .collect();

        debug!(iterations = budget.iterations, "Simplex finished");
        LpSolution {
            status: SolveStatus::Optimal,
            objective: Some(program.objective().evaluate(&values)),
            values,
            iterations: budget.iterations,
        }
    }
}

fn map_columns(bounds: &[Bounds]) -> (Vec<Column>, usize) {
    let mut next = 0;
    let mut take = || {
        next += 1;
        next - 1
    };

    let columns = bounds
        .iter()
        .map(|b| {
            if b.lower.is_finite() {
                Column::Shifted { col: take(), offset: b.lower }
            } else if b.upper.is_finite() {
                Column::Mirrored { col: take(), offset: b.upper }
            } else {
                Column::Split { pos: take(), neg: take() }
            }
        })
        .collect();

    (columns, next)
}

struct Row {
    coeffs: Vec<f64>,
    relation: Relation,
    rhs: f64,
}

/// Rewrites constraints and finite upper bounds over the structural columns,
/// with every right-hand side made non-negative.
fn standard_rows(program: &LinearProgram, columns: &[Column], width: usize) -> Vec<Row> {
    let mut rows = Vec::new();

    for constraint in program.constraints() {
        let mut coeffs = vec![0.0; width];
        let mut rhs = constraint.rhs - constraint.expr.constant_part();

        for (var, a) in constraint.expr.terms() {
            match columns[var.index()] {
                Column::Shifted { col, offset } => {
                    coeffs[col] += a;
                    rhs -= a * offset;
                }
                Column::Mirrored { col, offset } => {
                    coeffs[col] -= a;
                    rhs -= a * offset;
                }
                Column::Split { pos, neg } => {
                    coeffs[pos] += a;
                    coeffs[neg] -= a;
                }
            }
        }
        rows.push(Row {
            coeffs,
            relation: constraint.relation,
            rhs,
        });
    }

    for (b, column) in program.bounds().iter().zip(columns) {
        if let Column::Shifted { col, offset } = *column {
            if b.upper.is_finite() {
                let mut coeffs = vec![0.0; width];
                coeffs[col] = 1.0;
                rows.push(Row {
                    coeffs,
                    relation: Relation::LessOrEqual,
                    rhs: b.upper - offset,
                });
            }
        }
    }

    for row in &mut rows {
        if row.rhs < 0.0 {
            row.rhs = -row.rhs;
            row.coeffs.iter_mut().for_each(|c| *c = -*c);
            row.relation = match row.relation {
                Relation::LessOrEqual => Relation::GreaterOrEqual,
                Relation::GreaterOrEqual => Relation::LessOrEqual,
                Relation::Equal => Relation::Equal,
            };
        }
    }

    rows
}

enum Outcome {
    Optimal,
    Unbounded,
    Timeout,
}

struct Budget {
    iterations: usize,
    max_iterations: Option<usize>,
    deadline: Option<Instant>,
}

impl Budget {
    fn new(limits: &SolveLimits) -> Self {
        Self {
            iterations: 0,
            max_iterations: limits.max_iterations,
            deadline: limits.time_limit.map(|d| Instant::now() + d),
        }
    }

    fn exhausted(&self) -> bool {
        self.max_iterations.is_some_and(|max| self.iterations >= max)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

struct Tableau {
    /// `rows × (width + 1)`, the last entry holding the right-hand side.
    cells: Vec<Vec<f64>>,
    basis: Vec<usize>,
    first_artificial: usize,
    width: usize,
}

impl Tableau {
    /// Column layout: structural, then one slack or surplus per inequality,
    /// then one artificial per `>=` or `=` row.
    fn new(rows: Vec<Row>, structural: usize) -> Self {
        let slacks = rows.iter().filter(|r| r.relation != Relation::Equal).count();
        let artificials = rows.iter().filter(|r| r.relation != Relation::LessOrEqual).count();
        let first_artificial = structural + slacks;
        let width = first_artificial + artificials;

        let mut cells = Vec::with_capacity(rows.len());
        let mut basis = Vec::with_capacity(rows.len());
        let (mut slack, mut artificial) = (structural, first_artificial);

        for row in rows {
            let mut cell = vec![0.0; width + 1];
            cell[..structural].copy_from_slice(&row.coeffs);
            cell[width] = row.rhs;

            match row.relation {
                Relation::LessOrEqual => {
                    cell[slack] = 1.0;
                    basis.push(slack);
                    slack += 1;
                }
                Relation::GreaterOrEqual => {
                    cell[slack] = -1.0;
                    slack += 1;
                    cell[artificial] = 1.0;
                    basis.push(artificial);
                    artificial += 1;
                }
                Relation::Equal => {
                    cell[artificial] = 1.0;
                    basis.push(artificial);
                    artificial += 1;
                }
            }
            cells.push(cell);
        }

        Self {
            cells,
            basis,
            first_artificial,
            width,
        }
    }

    fn width(&self) -> usize {
        self.width
    }

    fn is_artificial(&self, col: usize) -> bool {
        col >= self.first_artificial
    }

    fn objective_value(&self, costs: &[f64]) -> f64 {
        self.cells
            .iter()
            .zip(&self.basis)
            .map(|(row, &b)| costs[b] * row[self.width])
            .sum()
    }

    fn reduced_cost(&self, costs: &[f64], col: usize) -> f64 {
        costs[col]
            - self
                .cells
                .iter()
                .zip(&self.basis)
                .map(|(row, &b)| costs[b] * row[col])
                .sum::<f64>()
    }

    fn run(&mut self, costs: &[f64], allowed: &[bool], budget: &mut Budget) -> Outcome {
        loop {
            let entering = (0..self.width)
                .filter(|&j| allowed[j] && !self.basis.contains(&j))
                .find(|&j| self.reduced_cost(costs, j) < -EPS);

            let Some(col) = entering else {
                return Outcome::Optimal;
            };

            if budget.exhausted() {
                return Outcome::Timeout;
            }

            let mut leaving: Option<(usize, f64)> = None;
            for (i, row) in self.cells.iter().enumerate() {
                if row[col] <= EPS {
                    continue;
                }
                let ratio = row[self.width].max(0.0) / row[col];
                leaving = match leaving {
                    Some((r, best))
                        if ratio > best + EPS
                            || ((ratio - best).abs() <= EPS && self.basis[r] < self.basis[i]) =>
                    {
                        Some((r, best))
                    }
                    _ => Some((i, ratio)),
                };
            }

            let Some((row, _)) = leaving else {
                return Outcome::Unbounded;
            };

            self.pivot(row, col);
            budget.iterations += 1;
        }
    }

    fn pivot(&mut self, row: usize, col: usize) {
        let pivot = self.cells[row][col];
        for v in &mut self.cells[row] {
            *v /= pivot;
        }

        let pivot_row = self.cells[row].clone();
        for (i, other) in self.cells.iter_mut().enumerate() {
            if i == row {
                continue;
            }
            let factor = other[col];
            if factor.abs() <= f64::EPSILON {
                continue;
            }
            for (v, p) in other.iter_mut().zip(&pivot_row) {
                *v -= factor * p;
            }
        }

        self.basis[row] = col;
    }

    /// Pivots artificial columns out of the basis after phase one, dropping
    /// rows that turn out to be redundant.
    fn drop_artificial_basis(&mut self) {
        let mut i = 0;
        while i < self.cells.len() {
            if !self.is_artificial(self.basis[i]) {
                i += 1;
                continue;
            }

            let replacement = (0..self.first_artificial).find(|&j| self.cells[i][j].abs() > EPS);
            match replacement {
                Some(col) => {
                    self.pivot(i, col);
                    i += 1;
                }
                None => {
                    self.cells.remove(i);
                    self.basis.remove(i);
                }
            }
        }
    }

    fn column_values(&self) -> Vec<f64> {
        let mut values = vec![0.0; self.width];
        for (row, &b) in self.cells.iter().zip(&self.basis) {
            values[b] = row[self.width].max(0.0);
        }
        values
    }
}
