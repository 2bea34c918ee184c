//! System Scheduling and Phase Execution
//!
//! Systems are assigned to exactly one [`Phase`]. Phases run strictly one
//! after another. Within a phase the scheduler builds a plan of *waves*: each
//! wave is a set of jobs whose declared component access does not conflict,
//! and the jobs of a wave run concurrently on a fixed worker pool.
//!
//! Serial systems (those holding the forced-serial marker mutably) are folded
//! into a single chain job that runs them back to back in registration order,
//! so at most one of them executes at any time within the phase.
//!
//! A system returning an error or panicking aborts the remainder of the
//! frame. There is no partial recovery: the caller receives the error and the
//! world is left in whatever state the completed systems produced.

use super::{FrameContext, System, SystemAccess, SystemError};
use crate::foundation::time::Stopwatch;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

/// Frame phases in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Entity lifecycle, body creation
    FrameStart = 0,
    /// Push kinematic transforms, character control
    PhysicsIn = 1,
    /// Advance physics worlds
    PhysicsStep = 2,
    /// Pull simulated transforms back into the hierarchy
    PhysicsOut = 3,
    /// Gameplay
    GameLogic = 4,
    /// Fill scene assembly buffers
    RenderQueue = 5,
    /// GPU command submission
    RenderDraw = 6,
    /// End-of-frame bookkeeping
    FrameEnd = 7,
}

impl Phase {
    /// Every phase, in order
    pub const ALL: [Phase; 8] = [
        Phase::FrameStart,
        Phase::PhysicsIn,
        Phase::PhysicsStep,
        Phase::PhysicsOut,
        Phase::GameLogic,
        Phase::RenderQueue,
        Phase::RenderDraw,
        Phase::FrameEnd,
    ];

    /// Position in the frame
    pub fn index(self) -> usize {
        self as usize
    }

    /// The phase that follows this one, if any
    pub fn next(self) -> Option<Phase> {
        Self::ALL.get(self.index() + 1).copied()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::FrameStart => "frame-start",
            Phase::PhysicsIn => "physics-in",
            Phase::PhysicsStep => "physics-step",
            Phase::PhysicsOut => "physics-out",
            Phase::GameLogic => "game-logic",
            Phase::RenderQueue => "render-queue",
            Phase::RenderDraw => "render-draw",
            Phase::FrameEnd => "frame-end",
        };
        f.write_str(name)
    }
}

/// Scheduler errors
#[derive(thiserror::Error, Debug)]
pub enum SchedulerError {
    /// A system returned an error; the frame was aborted
    #[error("system '{system}' failed during {phase}: {source}")]
    SystemFailed {
        /// Phase being executed
        phase: Phase,
        /// Name of the failing system
        system: String,
        /// Error reported by the system
        #[source]
        source: SystemError,
    },

    /// A system panicked; the frame was aborted
    #[error("system '{system}' panicked during {phase}: {message}")]
    SystemPanicked {
        /// Phase being executed
        phase: Phase,
        /// Name of the panicking system
        system: String,
        /// Panic payload, if it was a string
        message: String,
    },

    /// A worker thread could not be started
    #[error("failed to spawn worker thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),

    /// The worker pool has shut down
    #[error("worker pool is closed")]
    PoolClosed,
}

/// Timing summary of one frame
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    /// Frame counter the report belongs to
    pub frame_index: u64,
    /// Wall time spent in each phase, in milliseconds
    pub phase_millis: Vec<(Phase, f32)>,
    /// Number of system executions
    pub systems_run: usize,
}

impl FrameReport {
    /// Total wall time of all phases, in milliseconds
    pub fn total_millis(&self) -> f32 {
        self.phase_millis.iter().map(|(_, ms)| ms).sum()
    }
}

type SharedSystem = Arc<Mutex<Box<dyn System>>>;

struct RegisteredSystem {
    name: String,
    access: SystemAccess,
    system: SharedSystem,
}

/// A unit of work handed to the pool
#[derive(Debug, Clone, PartialEq, Eq)]
enum JobKind {
    /// One parallel system
    Single(usize),
    /// Every serial system of the phase, in registration order
    SerialChain(Vec<usize>),
}

impl JobKind {
    fn members(&self) -> &[usize] {
        match self {
            JobKind::Single(index) => std::slice::from_ref(index),
            JobKind::SerialChain(indices) => indices,
        }
    }
}

/// Execution plan for a single phase
#[derive(Debug, Default)]
struct PhasePlan {
    waves: Vec<Vec<JobKind>>,
}

#[derive(Default)]
struct PhaseSlot {
    systems: Vec<RegisteredSystem>,
    plan: Option<PhasePlan>,
}

/// Generate the wave plan for one phase
///
/// Greedy packing: jobs are considered in registration order (the serial chain
/// sits at the position of the first serial system). A job joins the current
/// wave if it conflicts neither with the jobs already in the wave nor with any
/// earlier job deferred to a later wave, so conflicting systems keep their
/// registration order.
fn generate_phase_plan(systems: &[RegisteredSystem]) -> PhasePlan {
    let serial: Vec<usize> = systems
        .iter()
        .enumerate()
        .filter(|(_, s)| s.access.is_serial())
        .map(|(index, _)| index)
        .collect();

    let mut jobs: Vec<(JobKind, SystemAccess)> = Vec::new();
    for (index, registered) in systems.iter().enumerate() {
        if registered.access.is_serial() {
            if serial.first() == Some(&index) {
                let mut access = SystemAccess::new();
                for &member in &serial {
                    access.merge(&systems[member].access);
                }
                jobs.push((JobKind::SerialChain(serial.clone()), access));
            }
        } else {
            jobs.push((JobKind::Single(index), registered.access.clone()));
        }
    }

    let mut waves = Vec::new();
    let mut remaining = jobs;
    while !remaining.is_empty() {
        let mut wave: Vec<(JobKind, SystemAccess)> = Vec::new();
        let mut deferred: Vec<(JobKind, SystemAccess)> = Vec::new();

        for (job, access) in remaining {
            let blocked = wave.iter().chain(deferred.iter())
                .any(|(_, other)| access.conflicts_with(other));
            if blocked {
                deferred.push((job, access));
            } else {
                wave.push((job, access));
            }
        }

        waves.push(wave.into_iter().map(|(job, _)| job).collect());
        remaining = deferred;
    }

    PhasePlan { waves }
}

/// Simple thread pool for parallel execution
pub struct ThreadPool {
    workers: Vec<Worker>,
    sender: Option<Sender<Job>>,
}

type Job = Box<dyn FnOnce() + Send + 'static>;

impl ThreadPool {
    /// Start `size` worker threads (at least one)
    pub fn new(size: usize) -> Result<Self, SchedulerError> {
        let (sender, receiver) = unbounded::<Job>();

        let mut workers = Vec::with_capacity(size.max(1));
        for id in 0..size.max(1) {
            workers.push(Worker::new(id, receiver.clone())?);
        }

        Ok(ThreadPool {
            workers,
            sender: Some(sender),
        })
    }

    /// Number of worker threads
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job on the pool
    pub fn execute<F>(&self, f: F) -> Result<(), SchedulerError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(SchedulerError::PoolClosed)?;
        sender.send(Box::new(f)).map_err(|_| SchedulerError::PoolClosed)
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // Closing the channel ends every worker loop
        drop(self.sender.take());

        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    log::error!("worker {} terminated abnormally", worker.id);
                }
            }
        }
    }
}

struct Worker {
    id: usize,
    thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    fn new(id: usize, receiver: Receiver<Job>) -> Result<Worker, SchedulerError> {
        let thread = thread::Builder::new()
            .name(format!("hearth-worker-{id}"))
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    job();
                }
            })?;

        Ok(Worker {
            id,
            thread: Some(thread),
        })
    }
}

/// Outcome of a job: the failing system's name and what went wrong
enum JobFailure {
    Error(String, SystemError),
    Panic(String, String),
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn run_job(members: &[(String, SharedSystem)], ctx: &FrameContext) -> Result<usize, JobFailure> {
    for (name, system) in members {
        let outcome = catch_unwind(AssertUnwindSafe(|| system.lock().run(ctx)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(error)) => return Err(JobFailure::Error(name.clone(), error)),
            Err(payload) => return Err(JobFailure::Panic(name.clone(), panic_message(payload))),
        }
    }
    Ok(members.len())
}

/// System scheduler with thread pool
pub struct SystemScheduler {
    phases: Vec<PhaseSlot>,
    thread_pool: ThreadPool,
    current_phase: Option<Phase>,
    frames_run: u64,
}

impl SystemScheduler {
    /// Create a scheduler backed by `thread_count` workers
    pub fn new(thread_count: usize) -> Result<Self, SchedulerError> {
        let thread_pool = ThreadPool::new(thread_count)?;
        log::info!("system scheduler started with {} workers", thread_pool.size());

        Ok(Self {
            phases: Phase::ALL.iter().map(|_| PhaseSlot::default()).collect(),
            thread_pool,
            current_phase: None,
            frames_run: 0,
        })
    }

    /// Register a system in a phase
    pub fn add_system<S: System + 'static>(&mut self, phase: Phase, system: S) {
        self.add_boxed_system(phase, Box::new(system));
    }

    /// Register an already boxed system in a phase
    pub fn add_boxed_system(&mut self, phase: Phase, system: Box<dyn System>) {
        let name = system.name().to_string();
        let access = system.access();
        log::debug!(
            "registered system '{}' in {}{}",
            name,
            phase,
            if access.is_serial() { " (serial)" } else { "" }
        );

        let slot = &mut self.phases[phase.index()];
        slot.systems.push(RegisteredSystem {
            name,
            access,
            system: Arc::new(Mutex::new(system)),
        });
        slot.plan = None;
    }

    /// Number of systems registered in a phase
    pub fn system_count(&self, phase: Phase) -> usize {
        self.phases[phase.index()].systems.len()
    }

    /// Names of the systems in a phase, in registration order
    pub fn system_names(&self, phase: Phase) -> Vec<&str> {
        self.phases[phase.index()]
            .systems
            .iter()
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Number of waves a phase executes as
    pub fn wave_count(&mut self, phase: Phase) -> usize {
        let slot = &mut self.phases[phase.index()];
        let systems = &slot.systems;
        slot.plan.get_or_insert_with(|| generate_phase_plan(systems)).waves.len()
    }

    /// Phase currently executing, `None` between frames
    pub fn current_phase(&self) -> Option<Phase> {
        self.current_phase
    }

    /// Number of frames fully executed
    pub fn frames_run(&self) -> u64 {
        self.frames_run
    }

    /// Execute every phase for one frame
    pub fn run_frame(&mut self, ctx: FrameContext) -> Result<FrameReport, SchedulerError> {
        let ctx = Arc::new(ctx);
        let mut report = FrameReport {
            frame_index: ctx.frame_index,
            ..FrameReport::default()
        };

        for phase in Phase::ALL {
            self.current_phase = Some(phase);
            log::trace!("frame {} entering {}", ctx.frame_index, phase);

            let stopwatch = Stopwatch::start_new();
            let result = self.run_phase(phase, &ctx);
            report.phase_millis.push((phase, stopwatch.elapsed_millis()));

            match result {
                Ok(count) => report.systems_run += count,
                Err(error) => {
                    log::error!("frame {} aborted: {}", ctx.frame_index, error);
                    self.current_phase = None;
                    return Err(error);
                }
            }
        }

        self.current_phase = None;
        self.frames_run += 1;
        Ok(report)
    }

    fn run_phase(&mut self, phase: Phase, ctx: &Arc<FrameContext>) -> Result<usize, SchedulerError> {
        let slot = &mut self.phases[phase.index()];
        if slot.systems.is_empty() {
            return Ok(0);
        }
        let systems = &slot.systems;
        let plan = slot.plan.get_or_insert_with(|| generate_phase_plan(systems));

        let mut executed = 0;
        for wave in &plan.waves {
            let jobs: Vec<Vec<(String, SharedSystem)>> = wave
                .iter()
                .map(|job| {
                    job.members()
                        .iter()
                        .map(|&index| (systems[index].name.clone(), Arc::clone(&systems[index].system)))
                        .collect()
                })
                .collect();

            if jobs.len() == 1 {
                // Single job - execute directly
                executed += run_job(&jobs[0], ctx).map_err(|failure| into_error(phase, failure))?;
                continue;
            }

            // Multiple jobs - execute in parallel, then wait for all of them
            let (done_tx, done_rx) = unbounded();
            let job_count = jobs.len();
            for members in jobs {
                let ctx = Arc::clone(ctx);
                let done_tx = done_tx.clone();
                self.thread_pool.execute(move || {
                    let outcome = run_job(&members, &ctx);
                    // The receiver only disappears if the scheduler itself unwound
                    let _ = done_tx.send(outcome);
                })?;
            }
            drop(done_tx);

            let mut first_failure = None;
            for _ in 0..job_count {
                match done_rx.recv() {
                    Ok(Ok(count)) => executed += count,
                    Ok(Err(failure)) => {
                        first_failure.get_or_insert(failure);
                    }
                    Err(_) => return Err(SchedulerError::PoolClosed),
                }
            }
            if let Some(failure) = first_failure {
                return Err(into_error(phase, failure));
            }
        }

        Ok(executed)
    }
}

fn into_error(phase: Phase, failure: JobFailure) -> SchedulerError {
    match failure {
        JobFailure::Error(system, source) => SchedulerError::SystemFailed { phase, system, source },
        JobFailure::Panic(system, message) => SchedulerError::SystemPanicked { phase, system, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{Component, FnSystem, World};
    use crate::foundation::time::FrameTime;
    use crate::input::InputSnapshot;
    use crate::render::SceneAssembly;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct Position;
    impl Component for Position {}
    struct Velocity;
    impl Component for Velocity {}

    fn registered(name: &str, access: SystemAccess) -> RegisteredSystem {
        let system = FnSystem::new(name, access.clone(), |_ctx: &FrameContext| Ok(()));
        RegisteredSystem {
            name: name.to_string(),
            access,
            system: Arc::new(Mutex::new(Box::new(system))),
        }
    }

    fn context() -> FrameContext {
        FrameContext::new(
            Arc::new(World::new()),
            Arc::new(SceneAssembly::default()),
            FrameTime { delta: 0.016, frame_count: 1, ..FrameTime::default() },
            InputSnapshot::default(),
        )
    }

    #[test]
    fn test_phase_order_is_total() {
        let mut phase = Phase::FrameStart;
        let mut visited = vec![phase];
        while let Some(next) = phase.next() {
            assert!(next > phase);
            visited.push(next);
            phase = next;
        }
        assert_eq!(visited, Phase::ALL.to_vec());
    }

    #[test]
    fn test_disjoint_systems_share_a_wave() {
        let systems = vec![
            registered("a", SystemAccess::new().writes::<Position>()),
            registered("b", SystemAccess::new().writes::<Velocity>()),
        ];
        let plan = generate_phase_plan(&systems);
        assert_eq!(plan.waves, vec![vec![JobKind::Single(0), JobKind::Single(1)]]);
    }

    #[test]
    fn test_conflicts_keep_registration_order() {
        let systems = vec![
            registered("writer", SystemAccess::new().writes::<Position>()),
            registered("reader", SystemAccess::new().reads::<Position>()),
            registered("late_writer", SystemAccess::new().writes::<Position>().reads::<Velocity>()),
            registered("velocity", SystemAccess::new().writes::<Velocity>()),
        ];
        let plan = generate_phase_plan(&systems);

        assert_eq!(
            plan.waves,
            vec![
                vec![JobKind::Single(0)],
                vec![JobKind::Single(1)],
                vec![JobKind::Single(2)],
                vec![JobKind::Single(3)],
            ]
        );
    }

    #[test]
    fn test_serial_systems_form_one_chain() {
        let systems = vec![
            registered("free", SystemAccess::new().reads::<Position>()),
            registered("serial_a", SystemAccess::new().serial()),
            registered("other", SystemAccess::new().writes::<Velocity>()),
            registered("serial_b", SystemAccess::new().serial()),
        ];
        let plan = generate_phase_plan(&systems);

        assert_eq!(
            plan.waves,
            vec![vec![
                JobKind::Single(0),
                JobKind::SerialChain(vec![1, 3]),
                JobKind::Single(2),
            ]]
        );
    }

    #[test]
    fn test_parallel_wave_runs_every_system() {
        let mut scheduler = SystemScheduler::new(4).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for i in 0..6 {
            let counter = Arc::clone(&counter);
            scheduler.add_system(
                Phase::GameLogic,
                FnSystem::new(format!("counter_{i}"), SystemAccess::new(), move |_ctx: &FrameContext| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            );
        }

        let report = scheduler.run_frame(context()).unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 6);
        assert_eq!(report.systems_run, 6);
        assert_eq!(scheduler.wave_count(Phase::GameLogic), 1);
        assert_eq!(scheduler.current_phase(), None);
    }

    #[test]
    fn test_failure_aborts_frame() {
        let mut scheduler = SystemScheduler::new(2).unwrap();
        let later_ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&later_ran);

        scheduler.add_system(
            Phase::PhysicsIn,
            FnSystem::new("broken", SystemAccess::new(), |_ctx: &FrameContext| {
                Err(SystemError::Failed("boom".to_string()))
            }),
        );
        scheduler.add_system(
            Phase::GameLogic,
            FnSystem::new("later", SystemAccess::new(), move |_ctx: &FrameContext| {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }),
        );

        let result = scheduler.run_frame(context());

        match result {
            Err(SchedulerError::SystemFailed { phase, system, .. }) => {
                assert_eq!(phase, Phase::PhysicsIn);
                assert_eq!(system, "broken");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(!later_ran.load(Ordering::SeqCst));
        assert_eq!(scheduler.frames_run(), 0);
    }

    #[test]
    fn test_panicking_system_is_reported() {
        let mut scheduler = SystemScheduler::new(2).unwrap();
        for name in ["calm", "panicky"] {
            scheduler.add_system(
                Phase::GameLogic,
                FnSystem::new(name, SystemAccess::new(), move |_ctx: &FrameContext| {
                    if name == "panicky" {
                        panic!("lost the plot");
                    }
                    Ok(())
                }),
            );
        }

        let result = scheduler.run_frame(context());

        assert!(matches!(
            result,
            Err(SchedulerError::SystemPanicked { phase: Phase::GameLogic, ref system, .. }) if system == "panicky"
        ));
    }
}
