/// Tile-rule simulation: the robot drives itself.
///
/// Per tick:
///   1. Read the tile under the robot and look up its color's action
///      (tiles without a color, and unset colors, are `Ignore`).
///   2. Rotate by that action (0, ±1 or 2 quarter turns).
///   3. Attempt one single-unit step with the normal legality rules.
///
/// `Crash` and `Win` stop the simulation. After `Limits::logic_ticks` ticks
/// without either it stops with `Exhausted`.

use log::{debug, info};

use crate::domain::color_rule::{ColorRules, RuleAction};
use crate::domain::command::Primitive;
use super::event::StepEvent;
use super::exec::Snapshot;
use super::interpreter::{Limits, Verdict};
use super::step::{self, Outcome};
use super::world::World;

pub struct LogicSim {
    initial: World,
    world: World,
    rules: ColorRules,
    limits: Limits,
    ticks: usize,
    verdict: Option<Verdict>,
}

impl LogicSim {
    pub fn new(world: World, rules: ColorRules, limits: Limits) -> Self {
        info!("simulation started: {:?}", rules);
        LogicSim { initial: world.clone(), world, rules, limits, ticks: 0, verdict: None }
    }

    pub fn restart(&mut self) {
        self.world = self.initial.clone();
        self.ticks = 0;
        self.verdict = None;
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn rules(&self) -> ColorRules {
        self.rules
    }

    pub fn verdict(&self) -> Option<Verdict> {
        self.verdict
    }

    pub fn is_finished(&self) -> bool {
        self.verdict.is_some()
    }

    pub fn ticks(&self) -> usize {
        self.ticks
    }

    pub fn finish(&mut self) -> Verdict {
        for _ in self.by_ref() {}
        self.verdict.unwrap_or(Verdict::Exhausted)
    }

    fn conclude(&mut self, verdict: Verdict) {
        self.verdict = Some(verdict);
        info!("simulation finished: {} after {} ticks", verdict.label(), self.ticks);
    }
}

impl Iterator for LogicSim {
    type Item = Snapshot;

    fn next(&mut self) -> Option<Snapshot> {
        if self.verdict.is_some() {
            return None;
        }
        if self.ticks >= self.limits.logic_ticks as usize {
            self.conclude(Verdict::Exhausted);
            return None;
        }

        let mut events = Vec::new();
        let color = self.world.tile_under_robot().color();
        let action = self.rules.action_for(color);
        if action != RuleAction::Ignore {
            self.world.robot.facing = action.apply(self.world.robot.facing);
            events.push(StepEvent::Turned { facing: self.world.robot.facing });
        }
        let outcome = step::evaluate(&mut self.world, Primitive::Step, &mut events);
        debug!("tick {}: {:?} then {:?}", self.ticks, action, outcome);

        let tick = self.ticks;
        self.ticks += 1;
        if outcome.is_terminal() {
            self.conclude(Verdict::from_outcome(outcome));
        }
        Some(Snapshot { step: tick, at: None, world: self.world.clone(), outcome, events })
    }
}

/// Run a whole simulation to its verdict.
pub fn simulate(world: &mut World, rules: ColorRules, limits: Limits) -> Verdict {
    let mut sim = LogicSim::new(world.clone(), rules, limits);
    let verdict = sim.finish();
    *world = sim.world;
    verdict
}
