//! End-to-end engine scenarios through the public library API.

use gridbot::domain::command::{Command, Program};
use gridbot::domain::robot::Facing;
use gridbot::domain::tile::Tile;
use gridbot::sim::exec::{Execution, Snapshot};
use gridbot::sim::interpreter::{execute, Interpreter, Limits, Verdict};
use gridbot::sim::level::LevelSet;
use gridbot::sim::session::Session;
use gridbot::sim::step::Outcome;
use gridbot::sim::world::World;

fn world(rows: &[&str], facing: Facing) -> World {
    World::from_diagram(rows, facing, 3).unwrap()
}

fn snapshots(program: &Program, w: &World) -> (Vec<Snapshot>, Execution) {
    let mut exec = Execution::new(program.clone(), w.clone(), Limits::default());
    let snaps: Vec<Snapshot> = exec.by_ref().collect();
    (snaps, exec)
}

const OPEN_5X5: [&str; 5] = [".....", ".....", "S.F..", ".....", "....."];

#[test]
fn move_two_reaches_goal() {
    let mut w = world(&OPEN_5X5, Facing::Right);
    let p = Program::new(vec![Command::forward(2)]);
    assert_eq!(execute(&p, &mut w, Limits::default()), Verdict::Win);
    assert_eq!(w.robot.pos(), (2, 2));
}

#[test]
fn wall_ahead_crashes_at_first_step() {
    let w = world(&[".....", ".....", "SWF..", ".....", "....."], Facing::Right);
    let p = Program::new(vec![Command::forward(2)]);
    let (snaps, exec) = snapshots(&p, &w);
    assert_eq!(exec.verdict(), Some(Verdict::Crash));
    assert_eq!(exec.crash_step(), Some(0));
    assert_eq!(snaps.len(), 1);
    assert_eq!(snaps[0].outcome, Outcome::Crash);
    assert_eq!(exec.world().robot.pos(), (0, 2));
}

#[test]
fn key_opens_door_and_robot_walks_through() {
    let w = world(&[".Y.D.", ".S...", ".....", ".....", "....."], Facing::Right);
    let p = Program::new(vec![
        Command::TurnLeft,
        Command::forward(1),
        Command::Pick,
        Command::TurnRight,
        Command::forward(1),
        Command::Use,
        Command::forward(1),
    ]);
    let (snaps, exec) = snapshots(&p, &w);
    assert_eq!(snaps.len(), 7);

    assert!(!snaps[1].world.robot.has_key());
    assert!(snaps[2].world.robot.has_key());
    assert_eq!(snaps[2].world.terrain_at(1, 0), Some(Tile::Floor));

    assert_eq!(snaps[4].world.terrain_at(3, 0), Some(Tile::DoorLocked));
    assert_eq!(snaps[5].world.terrain_at(3, 0), Some(Tile::DoorOpen));
    assert!(snaps[5].world.robot.has_key());

    assert_eq!(snaps[6].outcome, Outcome::Continue);
    assert_eq!(exec.world().robot.pos(), (3, 0));
    assert_eq!(exec.verdict(), Some(Verdict::Exhausted));
}

#[test]
fn use_without_key_leaves_door_locked() {
    let mut w = world(&["SDF"], Facing::Right);
    let mut events = vec![];
    let outcome = Interpreter::new(&[], Limits::default()).run(&[Command::Use], &mut w, &mut events);
    assert_eq!(outcome, Outcome::Continue);
    assert_eq!(w.terrain_at(1, 0), Some(Tile::DoorLocked));
    assert!(events.is_empty());
}

#[test]
fn zero_count_loop_equals_empty_sequence() {
    let base = world(&OPEN_5X5, Facing::Right);
    let mut a = base.clone();
    let mut b = base.clone();
    let looped = Program::new(vec![Command::repeat(0, vec![Command::forward(1)]), Command::TurnLeft]);
    let plain = Program::new(vec![Command::TurnLeft]);
    assert_eq!(execute(&looped, &mut a, Limits::default()), execute(&plain, &mut b, Limits::default()));
    assert_eq!(a, b);
}

#[test]
fn sensor_loop_without_wall_stops_at_bound() {
    let mut w = world(&["S.", ".."], Facing::Right);
    let limits = Limits { sensor_loop: 9, ..Limits::default() };
    // Two left turns and two right turns: the robot ends facing the open cell again.
    let body = vec![Command::TurnLeft, Command::TurnLeft, Command::TurnRight, Command::TurnRight];
    let mut events = vec![];
    let outcome = Interpreter::new(&[], limits).run(&[Command::until_blocked(body)], &mut w, &mut events);
    assert_eq!(outcome, Outcome::Continue);
    assert_eq!(events.len(), 9 * 4);
    assert_eq!(w.robot.pos(), (0, 0));
}

#[test]
fn runs_are_deterministic() {
    let w = world(&["S.R...", "......", "..B.Y.", "......", "....BF", "......"], Facing::Right);
    let p = Program::new(vec![
        Command::CallPattern,
        Command::repeat(2, vec![Command::TurnRight, Command::forward(2), Command::Pick]),
        Command::until_blocked(vec![Command::forward(1)]),
    ])
    .with_pattern(vec![Command::forward(2), Command::TurnRight]);

    let (a, exec_a) = snapshots(&p, &w);
    let (b, exec_b) = snapshots(&p, &w);
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.step, y.step);
        assert_eq!(x.at, y.at);
        assert_eq!(x.world, y.world);
        assert_eq!(x.outcome, y.outcome);
        assert_eq!(x.events, y.events);
    }
    assert_eq!(exec_a.verdict(), exec_b.verdict());
}

#[test]
fn stepper_agrees_with_recursive_interpreter() {
    let programs = [
        "move 2; left; move 2",
        "loop 3 { move; right } move 4",
        "while { move } left; while { move } right; move",
        "call; call; left; call; pattern { move 2; right; move }",
        "loop 2 { while { move } right } pick; use; move",
        "right; right; move; use; right; right; move 3; pick; move 2",
        "loop 0 { move } call",
    ];
    let levels = LevelSet::builtin();
    for level in &levels.levels {
        for text in programs {
            let program: Program = text.parse().unwrap();
            let start = World::from_level(level, 3);

            let mut recursive = start.clone();
            let expected = execute(&program, &mut recursive, Limits::default());

            let mut exec = Execution::new(program.clone(), start, Limits::default());
            let verdict = exec.finish();
            assert_eq!(verdict, expected, "{} / {}", level.id, text);
            assert_eq!(exec.world(), &recursive, "{} / {}", level.id, text);
        }
    }
}

#[test]
fn session_reset_twice_equals_reset_once() {
    let levels = LevelSet::builtin();
    let level = levels.find("data-1").unwrap().clone();
    let mut session = Session::new(level, Limits::default());
    session.set_program("left; move 2; right; move; pick".parse().unwrap()).unwrap();
    session.run_to_end().unwrap();
    assert!(session.world().robot.has_key());

    session.reset();
    let once = session.world().clone();
    session.reset();
    assert_eq!(session.world(), &once);
    assert!(!once.robot.has_key());
    assert_eq!(session.verdict(), None);
    assert_eq!(session.program().main.len(), 5);
}
