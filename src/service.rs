use crate::telemetry::logging;
use crate::world::state::World;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Ticks the loop may fall behind before it stops trying to catch up.
const MAX_TICK_BACKLOG: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerExit {
    Shutdown,
    Restart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerSignal {
    Running = 0,
    Shutdown = 1,
    Restart = 2,
}

/// Shared stop switch for the tick thread and whoever drives it.
#[derive(Debug)]
pub struct ServerControl {
    signal: AtomicU8,
}

impl Default for ServerControl {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerControl {
    pub fn new() -> Self {
        Self {
            signal: AtomicU8::new(ServerSignal::Running as u8),
        }
    }

    pub fn request_shutdown(&self) {
        self.signal.store(ServerSignal::Shutdown as u8, Ordering::SeqCst);
    }

    pub fn request_restart(&self) {
        self.signal.store(ServerSignal::Restart as u8, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        matches!(self.current_signal(), ServerSignal::Running)
    }

    pub fn exit_reason(&self) -> ServerExit {
        match self.current_signal() {
            ServerSignal::Restart => ServerExit::Restart,
            _ => ServerExit::Shutdown,
        }
    }

    fn current_signal(&self) -> ServerSignal {
        match self.signal.load(Ordering::SeqCst) {
            2 => ServerSignal::Restart,
            1 => ServerSignal::Shutdown,
            _ => ServerSignal::Running,
        }
    }
}

/// Runs `World::cycle` once per tick length until `control` stops it or
/// `max_ticks` ticks have run. A failing tick shuts the loop down and is
/// returned as the thread's error; otherwise the tick count is returned.
pub fn spawn_tick_loop(
    world: Arc<Mutex<World>>,
    control: Arc<ServerControl>,
    max_ticks: Option<u64>,
) -> Result<thread::JoinHandle<Result<u64, String>>, String> {
    thread::Builder::new()
        .name("world-tick".to_string())
        .spawn(move || tick_loop(&world, &control, max_ticks))
        .map_err(|err| format!("failed to spawn tick thread: {}", err))
}

fn tick_loop(world: &Mutex<World>, control: &ServerControl, max_ticks: Option<u64>) -> Result<u64, String> {
    let tick_length = world
        .lock()
        .map(|world| world.clock.tick_length())
        .unwrap_or_else(|_| Duration::from_millis(600));
    let mut ticks = 0u64;
    let mut next_tick = Instant::now();
    while control.is_running() {
        if max_ticks.is_some_and(|limit| ticks >= limit) {
            control.request_shutdown();
            break;
        }
        let now = Instant::now();
        if now < next_tick {
            thread::sleep((next_tick - now).min(tick_length / 2));
            continue;
        }

        {
            let mut world = world.lock().map_err(|_| "world lock poisoned".to_string())?;
            if let Err(err) = world.cycle() {
                control.request_shutdown();
                let message = format!("tick {} failed: {}", world.clock.now().0, err);
                logging::log_error(&message);
                return Err(message);
            }
        }
        ticks += 1;
        next_tick += tick_length;

        let behind = Instant::now().saturating_duration_since(next_tick);
        if behind > tick_length * MAX_TICK_BACKLOG {
            logging::log_lag(&format!(
                "tick loop {}ms behind after tick {}, skipping ahead",
                behind.as_millis(),
                ticks
            ));
            next_tick = Instant::now();
        }
    }
    Ok(ticks)
}
