// Simulation events: what happened during a step, for observers.
//
// Movement state machines and entity lifecycle commands emit `SimEvent`s
// into an `EventQueue` owned by `SimState`. Gameplay and UI code drains the
// queue once per tick (`SimState::drain_events`) and reacts to
// `NewPath` / `TargetReached` / `StopMoving` without registering callbacks
// on individual machines.
//
// The queue is a `BinaryHeap` with reversed ordering, keyed by
// `(tick, sequence)`, so events drain in the order they were emitted even if
// several ticks accumulate between drains.
//
// See also: `movement.rs` for `MoveEvent`, `sim.rs` for the step loop.
//
// **Critical constraint: determinism.** The `(tick, sequence)` key gives a
// total order; entities are processed in id order within a tick.

use crate::movement::{MoveEvent, StopReason};
use crate::types::{ActorId, EntityId, NodeId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// An emitted event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimEvent {
    pub tick: u64,
    /// Emission order within the queue's lifetime.
    pub sequence: u64,
    pub kind: SimEventKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SimEventKind {
    /// An entity accepted a path and started moving.
    NewPath {
        entity: EntityId,
        target: NodeId,
        total_cost: f32,
    },
    /// An entity reached the end of its path.
    TargetReached { entity: EntityId, node: NodeId },
    /// An entity stopped moving.
    StopMoving {
        entity: EntityId,
        node: NodeId,
        reason: StopReason,
    },
    EntitySpawned {
        entity: EntityId,
        actor: ActorId,
        node: NodeId,
    },
    EntityRemoved { entity: EntityId },
}

impl SimEventKind {
    /// Tag a machine event with its entity.
    pub fn from_move(entity: EntityId, event: MoveEvent) -> Self {
        match event {
            MoveEvent::NewPath { target, total_cost } => SimEventKind::NewPath {
                entity,
                target,
                total_cost,
            },
            MoveEvent::TargetReached { node } => SimEventKind::TargetReached { entity, node },
            MoveEvent::StopMoving { node, reason } => SimEventKind::StopMoving {
                entity,
                node,
                reason,
            },
        }
    }
}

// Min-heap on (tick, sequence).
impl PartialEq for SimEvent {
    fn eq(&self, other: &Self) -> bool {
        self.tick == other.tick && self.sequence == other.sequence
    }
}

impl Eq for SimEvent {}

impl PartialOrd for SimEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .tick
            .cmp(&self.tick)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Pending events, oldest first.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventQueue {
    heap: BinaryHeap<SimEvent>,
    next_sequence: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tick: u64, kind: SimEventKind) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(SimEvent {
            tick,
            sequence,
            kind,
        });
    }

    /// Pop the oldest event if it was emitted at or before `up_to_tick`.
    pub fn pop_if_ready(&mut self, up_to_tick: u64) -> Option<SimEvent> {
        if self.heap.peek().is_some_and(|e| e.tick <= up_to_tick) {
            self.heap.pop()
        } else {
            None
        }
    }

    /// Remove and return every pending event in emission order.
    pub fn drain(&mut self) -> Vec<SimEvent> {
        let mut out = Vec::with_capacity(self.heap.len());
        while let Some(event) = self.heap.pop() {
            out.push(event);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
