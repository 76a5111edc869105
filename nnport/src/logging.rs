//! Env-gated diagnostics.
//!
//! `NNPORT_TRACE` gates the general channel and `NNPORT_DEVICE_TRACE` the
//! device channel. Messages emitted inside an [`OpScope`] are prefixed with the
//! operation they belong to, e.g. `[#3 pool2d@host]`.
use std::cell::RefCell;
use std::env;
use std::fmt::Arguments;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy)]
enum TraceLevel {
    Off,
    Basic,
    Full,
}

const COLOR_WARNING: &str = "33";
const COLOR_ERROR: &str = "91";
const COLOR_CRITICAL: &str = "31";
const COLOR_DEVICE_TRACE: &str = "32";
const COLOR_TRACE: &str = "34";

static TRACE_LEVEL: OnceLock<TraceLevel> = OnceLock::new();
static DEVICE_TRACE_LEVEL: OnceLock<TraceLevel> = OnceLock::new();

thread_local! {
    static OP_CONTEXT: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Guard that tags messages on this thread with an operation until dropped.
/// Scopes nest; the innermost one wins.
#[must_use = "the operation context ends when the scope is dropped"]
pub struct OpScope {
    _private: (),
}

impl OpScope {
    /// Enter `op_id` of kind `tag`, optionally placed on `device`.
    pub fn enter(op_id: usize, tag: &str, device: Option<&str>) -> Self {
        let label = match device {
            Some(device) => format!("#{} {}@{}", op_id, tag, device),
            None => format!("#{} {}", op_id, tag),
        };
        OP_CONTEXT.with(|stack| stack.borrow_mut().push(label));
        Self { _private: () }
    }
}

impl Drop for OpScope {
    fn drop(&mut self) {
        OP_CONTEXT.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Label of the innermost active [`OpScope`] on this thread.
pub fn current_op() -> Option<String> {
    OP_CONTEXT.with(|stack| stack.borrow().last().cloned())
}

/// Body of a log line: the message, prefixed by the active operation if any.
pub fn format_message(args: Arguments) -> String {
    match current_op() {
        Some(op) => format!("[{}] {}", op, args),
        None => args.to_string(),
    }
}

fn parse_trace_level(value: &str) -> TraceLevel {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "basic" => TraceLevel::Basic,
        "full" => TraceLevel::Full,
        _ => TraceLevel::Off,
    }
}

fn env_trace_level(name: &str, cache: &OnceLock<TraceLevel>) -> TraceLevel {
    *cache.get_or_init(|| {
        env::var(name)
            .ok()
            .as_deref()
            .map(parse_trace_level)
            .unwrap_or(TraceLevel::Off)
    })
}

fn trace_level() -> TraceLevel {
    env_trace_level("NNPORT_TRACE", &TRACE_LEVEL)
}

fn device_trace_level() -> TraceLevel {
    env_trace_level("NNPORT_DEVICE_TRACE", &DEVICE_TRACE_LEVEL)
}

fn trace_full_enabled() -> bool {
    matches!(trace_level(), TraceLevel::Full)
}

fn trace_basic_enabled() -> bool {
    matches!(trace_level(), TraceLevel::Full | TraceLevel::Basic)
}

fn device_trace_enabled() -> bool {
    matches!(device_trace_level(), TraceLevel::Full | TraceLevel::Basic)
}

fn timestamp_hms() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        % 86_400;
    let hours = secs / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

fn emit(kind: &str, color: &str, args: Arguments) {
    let ts = timestamp_hms();
    let message = format_message(args);
    if color.is_empty() {
        eprintln!("{ts} [{kind}] -- {message}");
    } else {
        eprintln!("{ts} [\u{001b}[{color}m{kind}\u{001b}[0m] -- {message}");
    }
}

/// Emit a warning message when the trace level is `full`.
pub fn emit_warning(args: Arguments) {
    if trace_full_enabled() {
        emit("WARNING", COLOR_WARNING, args);
    }
}

/// Emit an error message when tracing is enabled.
pub fn emit_error(args: Arguments) {
    if trace_basic_enabled() {
        emit("ERROR", COLOR_ERROR, args);
    }
}

/// Emit a device-channel message when `NNPORT_DEVICE_TRACE` is set.
pub fn emit_device_trace(args: Arguments) {
    if device_trace_enabled() {
        emit("DEV_TRACE", COLOR_DEVICE_TRACE, args);
    }
}

/// Emit a critical message unconditionally.
pub fn emit_critical(args: Arguments) {
    emit("CRITICAL", COLOR_CRITICAL, args);
}

/// Emit a trace message when tracing is enabled.
pub fn emit_trace(args: Arguments) {
    if trace_basic_enabled() {
        emit("TRACE", COLOR_TRACE, args);
    }
}

#[macro_export]
macro_rules! warning {
    ($($arg:tt)*) => {
        $crate::logging::emit_warning(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::logging::emit_error(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! dev_trace {
    ($($arg:tt)*) => {
        $crate::logging::emit_device_trace(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! critical {
    ($($arg:tt)*) => {
        $crate::logging::emit_critical(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::logging::emit_trace(format_args!($($arg)*))
    };
}
