//! A small SAT engine: Tseitin encoding of expressions into CNF, and a CDCL search with two
//! watched literals per clause, first-UIP clause learning and non-chronological backjumping.

use super::{Model, SolverError};
use crate::ast::Expr;
use ahash::AHashMap;
use indexmap::IndexMap;
use std::{collections::BinaryHeap, ops};

/// A literal: a SAT variable together with a polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Lit(u32);

impl Lit {
    pub fn new(var: u32, positive: bool) -> Self {
        Lit(var << 1 | u32::from(!positive))
    }

    pub fn var(self) -> u32 {
        self.0 >> 1
    }

    pub fn is_positive(self) -> bool {
        self.0 & 1 == 0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl ops::Not for Lit {
    type Output = Lit;

    fn not(self) -> Lit {
        Lit(self.0 ^ 1)
    }
}

/// The result of a satisfiability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SatResult {
    /// The formula is satisfiable. Carries the values of the named variables in one satisfying
    /// assignment.
    Sat(Model),
    Unsat,
}

impl SatResult {
    pub fn is_unsat(&self) -> bool {
        matches!(self, SatResult::Unsat)
    }
}

/// A formula in conjunctive normal form, together with the table of named variables.
///
/// Gates are hash-consed: encoding two `and`/`or` nodes with the same set of child literals gives
/// the same gate literal. Since an `or` is encoded as a negated `and`, this also holds across the
/// two operators.
#[derive(Debug, Default)]
pub struct Cnf {
    num_vars: u32,
    clauses: Vec<Vec<Lit>>,
    named: IndexMap<String, u32>,
    gates: AHashMap<Vec<Lit>, Lit>,
    true_lit: Option<Lit>,
}

impl Cnf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    /// Creates a fresh, unnamed variable and returns its positive literal.
    pub fn new_var(&mut self) -> Lit {
        let var = self.num_vars;
        self.num_vars += 1;
        Lit::new(var, true)
    }

    /// Returns the positive literal of the variable with the given name, creating it if needed.
    pub fn named_var(&mut self, name: &str) -> Lit {
        if let Some(&var) = self.named.get(name) {
            return Lit::new(var, true);
        }
        let lit = self.new_var();
        self.named.insert(name.to_owned(), lit.var());
        lit
    }

    /// Adds a clause. Duplicate literals are removed, and tautological clauses are dropped.
    pub fn add_clause(&mut self, mut clause: Vec<Lit>) {
        clause.sort_unstable();
        clause.dedup();
        // After sorting, a literal and its negation are always adjacent
        if clause.windows(2).any(|w| w[0] == !w[1]) {
            return;
        }
        self.clauses.push(clause);
    }

    fn true_lit(&mut self) -> Lit {
        if let Some(lit) = self.true_lit {
            return lit;
        }
        let lit = self.new_var();
        self.add_clause(vec![lit]);
        self.true_lit = Some(lit);
        lit
    }

    /// Returns a literal equivalent to the conjunction of `lits`, adding a new gate only if no
    /// gate for the same literals exists yet.
    fn encode_and(&mut self, mut lits: Vec<Lit>) -> Lit {
        let t = self.true_lit();
        lits.retain(|&l| l != t);
        lits.sort_unstable();
        lits.dedup();
        if lits.windows(2).any(|w| w[0] == !w[1]) || lits.contains(&!t) {
            return !t;
        }
        match lits.as_slice() {
            [] => return t,
            [single] => return *single,
            _ => (),
        }
        if let Some(&gate) = self.gates.get(&lits) {
            return gate;
        }

        // `gate` implies every child, and all children together imply `gate`
        let gate = self.new_var();
        let mut big_clause = vec![gate];
        for &l in &lits {
            self.add_clause(vec![!gate, l]);
            big_clause.push(!l);
        }
        self.add_clause(big_clause);
        self.gates.insert(lits, gate);
        gate
    }

    /// Encodes `expr`, returning a literal that is equivalent to it in every model of the
    /// resulting clauses.
    pub fn encode(&mut self, expr: &Expr) -> Lit {
        match expr {
            Expr::Const(true) => self.true_lit(),
            Expr::Const(false) => !self.true_lit(),
            Expr::Var(name) => self.named_var(name),
            Expr::Not(inner) => !self.encode(inner),
            Expr::And(args) => {
                let lits = args.iter().map(|a| self.encode(a)).collect();
                self.encode_and(lits)
            }
            Expr::Or(args) => {
                let lits = args.iter().map(|a| !self.encode(a)).collect();
                !self.encode_and(lits)
            }
        }
    }

    /// Encodes `expr` and asserts that it is true.
    pub fn assert(&mut self, expr: &Expr) {
        let lit = self.encode(expr);
        self.add_clause(vec![lit]);
    }

    /// Asserts that `a` and `b` have different values.
    pub fn assert_distinct(&mut self, a: &Expr, b: &Expr) {
        let a = self.encode(a);
        let b = self.encode(b);
        self.add_clause(vec![a, b]);
        self.add_clause(vec![!a, !b]);
    }

    /// Searches for a satisfying assignment. If `conflict_limit` is given, the search is aborted
    /// with an error after that many conflicts.
    pub fn solve(&self, conflict_limit: Option<u64>) -> Result<SatResult, SolverError> {
        let Some(values) = Cdcl::new(self).search(conflict_limit)? else {
            return Ok(SatResult::Unsat);
        };
        let model = self
            .named
            .iter()
            .map(|(name, &var)| (name.clone(), values[var as usize].unwrap_or(false)))
            .collect();
        Ok(SatResult::Sat(model))
    }
}

/// Checks whether the conjunction of `assertions` is satisfiable.
pub fn check_sat(
    assertions: &[&Expr],
    conflict_limit: Option<u64>,
) -> Result<SatResult, SolverError> {
    let mut cnf = Cnf::new();
    for a in assertions {
        cnf.assert(a);
    }
    cnf.solve(conflict_limit)
}

fn lit_value(values: &[Option<bool>], lit: Lit) -> Option<bool> {
    values[lit.var() as usize].map(|v| v == lit.is_positive())
}

/// Returns the `i`-th element of the Luby sequence, starting from 0: 1, 1, 2, 1, 1, 2, 4, 1, ...
fn luby(mut i: u64) -> u64 {
    let mut size = 1;
    let mut exponent = 0;
    while size < i + 1 {
        exponent += 1;
        size = 2 * size + 1;
    }
    while size - 1 != i {
        size = (size - 1) >> 1;
        exponent -= 1;
        i %= size;
    }
    1 << exponent
}

const RESTART_INTERVAL: u64 = 100;
const ACTIVITY_DECAY: f64 = 0.95;
const ACTIVITY_LIMIT: f64 = 1e100;

struct Cdcl {
    clauses: Vec<Vec<Lit>>,
    units: Vec<Lit>,
    has_empty_clause: bool,
    watches: Vec<Vec<usize>>,

    values: Vec<Option<bool>>,
    levels: Vec<u32>,

    /// For each propagated variable, the clause that implied it. The implied literal is always
    /// the first of its reason clause.
    reasons: Vec<Option<usize>>,
    trail: Vec<Lit>,

    /// The trail index where each decision level starts.
    trail_limits: Vec<usize>,
    queue_head: usize,

    activity: Vec<f64>,
    activity_increment: f64,

    /// Candidate decision variables, by activity. Entries may be stale, so popped variables that
    /// are already assigned are skipped. Every unassigned variable has at least one entry.
    order: BinaryHeap<(u64, u32)>,
    saved_phases: Vec<bool>,
    seen: Vec<bool>,
}

impl Cdcl {
    fn new(cnf: &Cnf) -> Self {
        let num_vars = cnf.num_vars as usize;
        let mut watches = vec![Vec::new(); num_vars * 2];
        let mut clauses = Vec::with_capacity(cnf.clauses.len());
        let mut units = Vec::new();
        let mut has_empty_clause = false;
        for clause in &cnf.clauses {
            match clause.as_slice() {
                [] => has_empty_clause = true,
                [unit] => units.push(*unit),
                [first, second, ..] => {
                    watches[first.index()].push(clauses.len());
                    watches[second.index()].push(clauses.len());
                    clauses.push(clause.clone());
                }
            }
        }

        // Named variables start with a small bonus, so they are decided before gate variables
        let mut activity: Vec<f64> = vec![0.0; num_vars];
        for &v in cnf.named.values() {
            activity[v as usize] = 1.0;
        }
        let order = (0..cnf.num_vars)
            .map(|v| (activity[v as usize].to_bits(), v))
            .collect();

        Self {
            clauses,
            units,
            has_empty_clause,
            watches,
            values: vec![None; num_vars],
            levels: vec![0; num_vars],
            reasons: vec![None; num_vars],
            trail: Vec::new(),
            trail_limits: Vec::new(),
            queue_head: 0,
            activity,
            activity_increment: 1.0,
            order,
            saved_phases: vec![false; num_vars],
            seen: vec![false; num_vars],
        }
    }

    fn decision_level(&self) -> u32 {
        self.trail_limits.len() as u32
    }

    fn assign(&mut self, lit: Lit, reason: Option<usize>) {
        let var = lit.var() as usize;
        self.values[var] = Some(lit.is_positive());
        self.levels[var] = self.decision_level();
        self.reasons[var] = reason;
        self.trail.push(lit);
    }

    /// Propagates all assignments in the trail that were not yet propagated. Returns the index
    /// of a falsified clause if a conflict was found.
    fn propagate(&mut self) -> Option<usize> {
        while self.queue_head < self.trail.len() {
            let false_lit = !self.trail[self.queue_head];
            self.queue_head += 1;

            let mut watchers = std::mem::take(&mut self.watches[false_lit.index()]);
            let mut conflict = None;
            let mut i = 0;
            while i < watchers.len() {
                let ci = watchers[i];
                let clause = &mut self.clauses[ci];
                if clause[0] == false_lit {
                    clause.swap(0, 1);
                }
                let first = clause[0];
                if lit_value(&self.values, first) == Some(true) {
                    i += 1;
                    continue;
                }

                let values = &self.values;
                let replacement =
                    (2..clause.len()).find(|&k| lit_value(values, clause[k]) != Some(false));
                if let Some(k) = replacement {
                    clause.swap(1, k);
                    self.watches[clause[1].index()].push(ci);
                    watchers.swap_remove(i);
                    continue;
                }

                if lit_value(&self.values, first) == Some(false) {
                    conflict = Some(ci);
                    break;
                }
                self.assign(first, Some(ci));
                i += 1;
            }
            self.watches[false_lit.index()] = watchers;
            if conflict.is_some() {
                return conflict;
            }
        }
        None
    }

    fn bump(&mut self, var: u32) {
        let activity = &mut self.activity[var as usize];
        *activity += self.activity_increment;
        if *activity > ACTIVITY_LIMIT {
            for a in &mut self.activity {
                *a /= ACTIVITY_LIMIT;
            }
            self.activity_increment /= ACTIVITY_LIMIT;
            self.rebuild_order();
        }
    }

    fn rebuild_order(&mut self) {
        let order = (0..self.values.len())
            .filter(|&v| self.values[v].is_none())
            .map(|v| (self.activity[v].to_bits(), v as u32))
            .collect();
        self.order = order;
    }

    /// Derives the first-UIP clause of a conflict. Returns the learned clause, whose first
    /// literal is the one asserted after backjumping, and the level to backjump to. If the
    /// clause has more than one literal, its second literal has the highest level among the rest.
    fn analyze(&mut self, conflict: usize) -> (Vec<Lit>, u32) {
        let level = self.decision_level();
        let mut learned = Vec::new();
        let mut pending = 0;
        let mut index = self.trail.len();
        let mut clause = conflict;
        let mut is_reason = false;

        let uip = loop {
            // The first literal of a reason clause is the one being resolved on
            for k in usize::from(is_reason)..self.clauses[clause].len() {
                let lit = self.clauses[clause][k];
                let var = lit.var() as usize;
                if self.seen[var] || self.levels[var] == 0 {
                    continue;
                }
                self.seen[var] = true;
                self.bump(lit.var());
                if self.levels[var] == level {
                    pending += 1;
                } else {
                    learned.push(lit);
                }
            }

            let lit = loop {
                index -= 1;
                let lit = self.trail[index];
                if self.seen[lit.var() as usize] {
                    break lit;
                }
            };
            self.seen[lit.var() as usize] = false;
            pending -= 1;
            match self.reasons[lit.var() as usize] {
                Some(reason) if pending > 0 => {
                    clause = reason;
                    is_reason = true;
                }
                _ => break lit,
            }
        };

        for lit in &learned {
            self.seen[lit.var() as usize] = false;
        }
        learned.insert(0, !uip);

        let highest = (1..learned.len()).max_by_key(|&k| self.levels[learned[k].var() as usize]);
        let backjump_level = match highest {
            Some(k) => {
                learned.swap(1, k);
                self.levels[learned[1].var() as usize]
            }
            None => 0,
        };
        (learned, backjump_level)
    }

    /// Undoes every assignment made after `level`.
    fn backjump(&mut self, level: u32) {
        let Some(&start) = self.trail_limits.get(level as usize) else {
            return;
        };
        for lit in self.trail.drain(start..) {
            let var = lit.var() as usize;
            self.values[var] = None;
            self.reasons[var] = None;
            self.saved_phases[var] = lit.is_positive();
            self.order.push((self.activity[var].to_bits(), lit.var()));
        }
        self.trail_limits.truncate(level as usize);
        self.queue_head = self.trail.len();
        if self.order.len() > 4 * self.values.len() + 1024 {
            self.rebuild_order();
        }
    }

    /// Adds a learned clause and asserts its first literal. Must be called right after
    /// backjumping to the level returned by `analyze`.
    fn learn(&mut self, clause: Vec<Lit>) {
        let asserted = clause[0];
        if clause.len() == 1 {
            self.assign(asserted, None);
            return;
        }
        let index = self.clauses.len();
        self.watches[clause[0].index()].push(index);
        self.watches[clause[1].index()].push(index);
        self.clauses.push(clause);
        self.assign(asserted, Some(index));
    }

    fn next_decision(&mut self) -> Option<Lit> {
        while let Some((_, var)) = self.order.pop() {
            if self.values[var as usize].is_none() {
                return Some(Lit::new(var, self.saved_phases[var as usize]));
            }
        }
        None
    }

    /// Returns the full assignment if the clauses are satisfiable, or `None` if they are not.
    fn search(
        mut self,
        conflict_limit: Option<u64>,
    ) -> Result<Option<Vec<Option<bool>>>, SolverError> {
        if self.has_empty_clause {
            return Ok(None);
        }
        for unit in std::mem::take(&mut self.units) {
            match lit_value(&self.values, unit) {
                Some(true) => (),
                Some(false) => return Ok(None),
                None => self.assign(unit, None),
            }
        }

        let mut conflicts = 0;
        let mut restarts = 0;
        let mut until_restart = RESTART_INTERVAL;
        loop {
            if let Some(conflict) = self.propagate() {
                conflicts += 1;
                if conflict_limit.is_some_and(|limit| conflicts > limit) {
                    return Err(SolverError::ResourceLimit(conflicts - 1));
                }
                if self.decision_level() == 0 {
                    return Ok(None);
                }
                let (learned, level) = self.analyze(conflict);
                self.backjump(level);
                self.learn(learned);
                self.activity_increment /= ACTIVITY_DECAY;
                until_restart = until_restart.saturating_sub(1);
                continue;
            }

            if until_restart == 0 {
                restarts += 1;
                until_restart = RESTART_INTERVAL * luby(restarts);
                self.backjump(0);
                continue;
            }

            let Some(lit) = self.next_decision() else {
                return Ok(Some(self.values));
            };
            self.trail_limits.push(self.trail.len());
            self.assign(lit, None);
        }
    }
}
