/// Diagnostic traces for internal faults.
///
/// A trace is the error's source chain followed by a captured backtrace. The
/// backtrace is captured where the fault is handled, which for panics is the
/// `catch_unwind` boundary rather than the panic site.
use std::any::Any;
use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt::Write;

/// Source chain of `err`, one cause per line, then a forced backtrace
pub fn error_trace(err: &(dyn Error + 'static)) -> String {
    let mut trace = format!("{}\n", err);
    let mut source = err.source();
    while let Some(cause) = source {
        let _ = writeln!(trace, "Caused by: {}", cause);
        source = cause.source();
    }
    append_backtrace(&mut trace);
    trace
}

/// Human-readable message carried by a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

pub fn panic_trace(payload: &(dyn Any + Send)) -> String {
    let mut trace = format!("panic: {}\n", panic_message(payload));
    append_backtrace(&mut trace);
    trace
}

fn append_backtrace(trace: &mut String) {
    let _ = write!(trace, "Backtrace:\n{}", Backtrace::force_capture());
}
