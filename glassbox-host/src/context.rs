//! Isolated execution context: one fresh sandboxed Luau VM per episode.
//!
//! The VM is created, driven and dropped inside a single blocking task; it
//! never crosses threads. Only plain-data mount snapshots are shared with
//! the host. The document chunk runs as a Luau thread under a resume loop,
//! so the interrupt-based cooperative yield keeps even badly behaved
//! components from monopolizing the tick, and a cancellation flag plus an
//! execution deadline bound the worst case.

use crate::config::PreviewConfig;
use crate::outcome::{MountSnapshot, SharedSnapshot};
use glassbox_source::ExecutionDocument;
use log::debug;
use mlua::{Lua, Table, ThreadStatus, Value, VmState};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Default Lua heap limit per preview VM: 8 MiB.
pub const LUA_MEMORY_LIMIT_BYTES: usize = 8 * 1024 * 1024;

/// Signal from the context to the episode task: the document loaded (first
/// mount report observed), it failed to initialize at all, or it burned
/// through the execution budget before ever reporting.
#[derive(Debug)]
pub enum LoadSignal {
    Loaded,
    Failed(String),
    TimedOut,
}

/// Handle to a live sandbox. Dropping it (or calling [`teardown`]) stops
/// the VM at the next tick or interrupt.
///
/// [`teardown`]: ExecutionContext::teardown
pub struct ExecutionContext {
    snapshot: SharedSnapshot,
    cancel: Arc<AtomicBool>,
    signal_rx: oneshot::Receiver<LoadSignal>,
}

impl ExecutionContext {
    /// Spawn a fresh sandboxed VM and inject the document as its entire
    /// content.
    pub fn launch(
        document: ExecutionDocument,
        config: &PreviewConfig,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        let snapshot: SharedSnapshot = Arc::new(Mutex::new(None));
        let (signal_tx, signal_rx) = oneshot::channel();

        let shared = snapshot.clone();
        let flag = cancel.clone();
        let cfg = config.clone();
        tokio::task::spawn_blocking(move || {
            run_document(&document, &cfg, shared, flag, signal_tx);
        });

        Self {
            snapshot,
            cancel,
            signal_rx,
        }
    }

    /// Wait for the load-completion or failure observer. A sandbox that
    /// disappears without signaling counts as a load failure.
    pub async fn loaded(&mut self) -> LoadSignal {
        match (&mut self.signal_rx).await {
            Ok(signal) => signal,
            Err(_) => LoadSignal::Failed("sandbox terminated before load completed".to_string()),
        }
    }

    pub fn snapshot(&self) -> SharedSnapshot {
        self.snapshot.clone()
    }

    /// Stop the VM. Idempotent; effective at the next tick or interrupt.
    pub fn teardown(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Blocking body: build the VM, load the chunk, drive it to completion.
fn run_document(
    document: &ExecutionDocument,
    config: &PreviewConfig,
    snapshot: SharedSnapshot,
    cancel: Arc<AtomicBool>,
    signal_tx: oneshot::Sender<LoadSignal>,
) {
    let mut signal_tx = Some(signal_tx);
    let console: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let deadline = Instant::now() + Duration::from_millis(config.execution_budget_ms);

    let lua = match create_preview_lua(config, cancel.clone(), deadline) {
        Ok(lua) => lua,
        Err(e) => {
            fail(&mut signal_tx, format!("sandbox init failed: {}", e));
            return;
        }
    };
    if let Err(e) = register_harness_api(&lua, snapshot.clone(), console.clone()) {
        fail(&mut signal_tx, format!("sandbox init failed: {}", e));
        return;
    }

    let chunk = match lua
        .load(document.chunk())
        .set_name("preview-document")
        .into_function()
    {
        Ok(f) => f,
        Err(e) => {
            fail(&mut signal_tx, format!("document failed to compile: {}", e));
            return;
        }
    };
    let thread = match lua.create_thread(chunk) {
        Ok(t) => t,
        Err(e) => {
            fail(&mut signal_tx, format!("sandbox init failed: {}", e));
            return;
        }
    };

    loop {
        if cancel.load(Ordering::Relaxed) {
            // Superseded or torn down: stop without signaling; the episode
            // that cared is gone.
            return;
        }
        if Instant::now() > deadline {
            // Overran the in-VM budget before ever reporting a mount.
            timed_out(&mut signal_tx);
            flush_console(&console);
            return;
        }
        match thread.status() {
            ThreadStatus::Resumable => {
                if let Err(e) = thread.resume::<()>(()) {
                    if Instant::now() > deadline {
                        // The interrupt raised the deadline error mid-resume;
                        // same bucket as the wall check above.
                        timed_out(&mut signal_tx);
                    } else {
                        // The harness never lets component errors escape, so
                        // an uncaught error means the document itself is
                        // broken.
                        fail(&mut signal_tx, format!("preview document crashed: {}", e));
                    }
                    flush_console(&console);
                    return;
                }
            }
            ThreadStatus::Running => {}
            ThreadStatus::Error => {
                fail(&mut signal_tx, "preview document crashed".to_string());
                flush_console(&console);
                return;
            }
            ThreadStatus::Finished => break,
        }
        if has_report(&snapshot) {
            // First mount report = load completion. Keep ticking so the
            // settle pass (queued effects, re-render) can still run.
            if let Some(tx) = signal_tx.take() {
                let _ = tx.send(LoadSignal::Loaded);
            }
        }
    }

    flush_console(&console);
    if has_report(&snapshot) {
        if let Some(tx) = signal_tx.take() {
            let _ = tx.send(LoadSignal::Loaded);
        }
    } else {
        fail(
            &mut signal_tx,
            "document finished without reporting a mount".to_string(),
        );
    }
}

fn fail(signal_tx: &mut Option<oneshot::Sender<LoadSignal>>, message: String) {
    if let Some(tx) = signal_tx.take() {
        let _ = tx.send(LoadSignal::Failed(message));
    }
}

fn timed_out(signal_tx: &mut Option<oneshot::Sender<LoadSignal>>) {
    if let Some(tx) = signal_tx.take() {
        let _ = tx.send(LoadSignal::TimedOut);
    }
}

fn has_report(snapshot: &SharedSnapshot) -> bool {
    snapshot.lock().map(|guard| guard.is_some()).unwrap_or(false)
}

fn flush_console(console: &Arc<Mutex<Vec<String>>>) {
    if let Ok(lines) = console.lock() {
        for line in lines.iter() {
            debug!("[sandbox] {}", line);
        }
    }
}

/// Fresh sandboxed Luau state: sealed libraries, heap cap, and an interrupt
/// that yields cooperatively, enforces cancellation, and raises once the
/// execution deadline passes.
fn create_preview_lua(
    config: &PreviewConfig,
    cancel: Arc<AtomicBool>,
    deadline: Instant,
) -> Result<Lua, mlua::Error> {
    let lua = Lua::new();
    lua.sandbox(true)?;
    lua.set_memory_limit(config.lua_memory_limit_bytes)?;

    let count = AtomicU64::new(0);
    const MAX_STACK_LEVEL: usize = 64;
    lua.set_interrupt(move |lua| {
        if cancel.load(Ordering::Relaxed) {
            return Err(mlua::Error::runtime("preview cancelled"));
        }
        if Instant::now() > deadline {
            return Err(mlua::Error::runtime("execution budget exceeded"));
        }
        // Only yield when no C (Rust) frame is on the stack; avoids "yield
        // across C-call boundary".
        for level in 0..=MAX_STACK_LEVEL {
            if let Some(what) = lua.inspect_stack(level, |debug| debug.source().what) {
                if what == "C" {
                    return Ok(VmState::Continue);
                }
            } else {
                break;
            }
        }
        if count.fetch_add(1, Ordering::Relaxed) % 2 == 0 {
            return Ok(VmState::Yield);
        }
        Ok(VmState::Continue)
    });

    Ok(lua)
}

/// Register the harness-facing API on the VM: the controlled loader, the
/// mount report callback, and a `print` that captures console lines.
fn register_harness_api(
    lua: &Lua,
    snapshot: SharedSnapshot,
    console: Arc<Mutex<Vec<String>>>,
) -> Result<(), mlua::Error> {
    // __glassbox_load(source, scope) -> (chunk?, err?)
    // The sandbox strips `load`, so compilation goes through the host; the
    // explicit environment keeps component bindings out of the globals.
    let loader = lua.create_function(|lua, (source, scope): (String, Table)| {
        match lua
            .load(&source)
            .set_name("component")
            .set_environment(scope)
            .into_function()
        {
            Ok(f) => Ok((Some(f), None::<String>)),
            Err(e) => Ok((None, Some(e.to_string()))),
        }
    })?;
    lua.globals().set("__glassbox_load", loader)?;

    // __glassbox_report(children, markup) -> latest mount snapshot
    let report = lua.create_function(move |_, (children, markup): (u32, String)| {
        if let Ok(mut guard) = snapshot.lock() {
            *guard = Some(MountSnapshot { children, markup });
        }
        Ok(())
    })?;
    lua.globals().set("__glassbox_report", report)?;

    let print_fn = lua.create_function(move |_, args: mlua::Variadic<Value>| {
        let parts: Vec<String> = args
            .iter()
            .map(|v| match v {
                Value::String(s) => s.to_str().map(|x| x.to_string()).unwrap_or_default(),
                Value::Integer(n) => n.to_string(),
                Value::Number(n) => n.to_string(),
                Value::Boolean(b) => b.to_string(),
                Value::Nil => "nil".to_string(),
                _ => format!("{:?}", v),
            })
            .collect();
        if let Ok(mut lines) = console.lock() {
            lines.push(parts.join("\t"));
        }
        Ok(())
    })?;
    lua.globals().set("print", print_fn)?;

    Ok(())
}
