/// Events emitted during a primitive step or a simulation tick.
/// The presentation layer consumes these for animation/sound.

use crate::domain::robot::Facing;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StepEvent {
    Moved { x: usize, y: usize },
    Turned { facing: Facing },
    KeyPicked { x: usize, y: usize },
    FireExtinguished { x: usize, y: usize },
    DoorOpened { x: usize, y: usize },
    WaterRefilled { water: u32 },
    /// A move was rejected; the robot stayed put.
    Blocked,
    ReachedGoal { x: usize, y: usize },
}
