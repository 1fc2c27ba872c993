use crate::entities::attributes::PawnRef;
use crate::entities::movement::StepType;
use crate::entities::pawn::LockState;
use crate::path::request::Route;
use crate::world::state::World;
use crate::world::tile::Tile;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskPriority {
    /// Dropped as soon as anything stronger is queued.
    Weak,
    Standard,
    /// Terminates every other task of the pawn when queued.
    Strong,
}

pub type TaskPredicate = Box<dyn FnMut(&World, PawnRef) -> bool + Send>;
pub type TaskBody = Box<dyn for<'a> FnMut(&mut TaskContext<'a>) -> TaskState + Send>;

/// What a task wants after one resumption.
pub enum TaskState {
    Wait(u32),
    WaitUntil(TaskPredicate),
    AwaitRoute,
    Done,
}

impl std::fmt::Debug for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Wait(ticks) => write!(f, "Wait({})", ticks),
            TaskState::WaitUntil(_) => write!(f, "WaitUntil(..)"),
            TaskState::AwaitRoute => write!(f, "AwaitRoute"),
            TaskState::Done => write!(f, "Done"),
        }
    }
}

enum Suspension {
    Start,
    Ticks(u32),
    Until(TaskPredicate),
    Route(Option<u64>),
}

pub struct QueueTask {
    priority: TaskPriority,
    locking: bool,
    suspension: Suspension,
    body: TaskBody,
}

impl QueueTask {
    pub fn priority(&self) -> TaskPriority {
        self.priority
    }
}

/// Handed to a task body on every resumption.
pub struct TaskContext<'a> {
    pub world: &'a mut World,
    pub pawn: PawnRef,
    route: Option<Route>,
    awaiting: Option<u64>,
}

impl<'a> TaskContext<'a> {
    /// Route delivered to this resumption after an `AwaitRoute`.
    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn take_route(&mut self) -> Option<Route> {
        self.route.take()
    }

    /// Issues a walk request and suspends until its route resolves. The task
    /// resumes with the route in [`TaskContext::route`].
    pub fn walk_to_await(&mut self, destination: Tile, step_type: StepType, detect_collision: bool) -> TaskState {
        self.awaiting = self
            .world
            .walk_to_await(self.pawn, destination, step_type, detect_collision);
        TaskState::AwaitRoute
    }
}

#[derive(Default)]
pub struct QueueTaskSet {
    tasks: VecDeque<QueueTask>,
    generation: u64,
}

impl std::fmt::Debug for QueueTaskSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueTaskSet")
            .field("tasks", &self.tasks.len())
            .field("generation", &self.generation)
            .finish()
    }
}

impl QueueTaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn push(&mut self, task: QueueTask) {
        if task.priority > TaskPriority::Weak {
            self.tasks.retain(|queued| queued.priority != TaskPriority::Weak);
        }
        self.tasks.push_back(task);
    }

    /// Drops every task. Returns whether any of them held the pawn's lock.
    fn terminate(&mut self) -> bool {
        let held_lock = self.tasks.iter().any(|task| task.locking);
        self.tasks.clear();
        self.generation = self.generation.wrapping_add(1);
        held_lock
    }
}

impl World {
    pub fn queue<F>(&mut self, pawn: PawnRef, priority: TaskPriority, body: F)
    where
        F: for<'a> FnMut(&mut TaskContext<'a>) -> TaskState + Send + 'static,
    {
        self.push_task(pawn, priority, false, Box::new(body));
    }

    /// Locks the pawn right away and releases the lock once the task finishes
    /// or is terminated.
    pub fn locking_queue<F>(&mut self, pawn: PawnRef, priority: TaskPriority, lock: LockState, body: F)
    where
        F: for<'a> FnMut(&mut TaskContext<'a>) -> TaskState + Send + 'static,
    {
        if priority == TaskPriority::Strong {
            self.interrupt_queues(pawn);
        }
        let Some(target) = self.pawn_mut(pawn) else {
            return;
        };
        target.lock = lock;
        self.push_task(pawn, priority, true, Box::new(body));
    }

    fn push_task(&mut self, pawn: PawnRef, priority: TaskPriority, locking: bool, body: TaskBody) {
        if priority == TaskPriority::Strong && !locking {
            self.interrupt_queues(pawn);
        }
        if let Some(target) = self.pawn_mut(pawn) {
            target.queues.push(QueueTask {
                priority,
                locking,
                suspension: Suspension::Start,
                body,
            });
        }
    }

    /// Terminates every task of the pawn. Routes kept for awaiting tasks go
    /// with them, and a search still in flight no longer stores its route.
    pub fn interrupt_queues(&mut self, pawn: PawnRef) {
        if let Some(target) = self.pawn_mut(pawn) {
            if target.queues.terminate() {
                target.unlock();
            }
            target.route_results.clear();
            if let Some(future) = target.future_route.as_mut() {
                future.awaited = false;
            }
        }
    }

    /// Resumes the pawn's head task if its suspension point has been reached.
    pub(crate) fn cycle_queues(&mut self, pawn: PawnRef) {
        let (mut task, generation) = {
            let Some(target) = self.pawn_mut(pawn) else {
                return;
            };
            let Some(task) = target.queues.tasks.pop_front() else {
                return;
            };
            (task, target.queues.generation)
        };

        let ready = match &mut task.suspension {
            Suspension::Start => true,
            Suspension::Ticks(remaining) => {
                *remaining = remaining.saturating_sub(1);
                *remaining == 0
            }
            Suspension::Until(predicate) => predicate(self, pawn),
            Suspension::Route(Some(seq)) => {
                let seq = *seq;
                self.pawn(pawn)
                    .map(|target| target.route_results.contains_key(&seq))
                    .unwrap_or(false)
            }
            Suspension::Route(None) => true,
        };
        if !ready {
            if let Some(target) = self.pawn_mut(pawn) {
                if target.queues.generation == generation {
                    target.queues.tasks.push_front(task);
                }
            }
            return;
        }

        let route = match task.suspension {
            Suspension::Route(Some(seq)) => self
                .pawn_mut(pawn)
                .and_then(|target| target.route_results.remove(&seq)),
            _ => None,
        };
        let mut ctx = TaskContext {
            world: self,
            pawn,
            route,
            awaiting: None,
        };
        let state = (task.body)(&mut ctx);
        let awaiting = ctx.awaiting;

        let Some(target) = self.pawn_mut(pawn) else {
            return;
        };
        if target.queues.generation != generation {
            return;
        }
        task.suspension = match state {
            TaskState::Done => {
                if task.locking {
                    target.unlock();
                }
                return;
            }
            TaskState::Wait(ticks) => Suspension::Ticks(ticks.max(1)),
            TaskState::WaitUntil(predicate) => Suspension::Until(predicate),
            TaskState::AwaitRoute => Suspension::Route(awaiting),
        };
        target.queues.tasks.push_front(task);
    }
}
