//! Crash isolation for logic units.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// How a listener wants a logic crash handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashVote {
    /// Let the crash propagate to the hosting task.
    Propagate,
    /// Treat the crash as handled (e.g. a fallback surface is shown).
    Recover,
}

/// An error returned or a panic raised by a logic unit.
#[derive(Debug, Clone)]
pub struct LogicCrash {
    module: &'static str,
    action: &'static str,
    message: String,
    panicked: bool,
}

impl LogicCrash {
    pub(crate) fn error(module: &'static str, action: &'static str, error: &anyhow::Error) -> Self {
        Self {
            module,
            action,
            message: format!("{:#}", error),
            panicked: false,
        }
    }

    pub(crate) fn panic(module: &'static str, action: &'static str, message: String) -> Self {
        Self {
            module,
            action,
            message,
            panicked: true,
        }
    }

    pub fn module(&self) -> &'static str {
        self.module
    }

    pub fn action(&self) -> &'static str {
        self.action
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_panic(&self) -> bool {
        self.panicked
    }
}

impl fmt::Display for LogicCrash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.panicked { "panicked" } else { "failed" };
        write!(
            f,
            "Logic of module '{}' {} handling {}: {}",
            self.module, kind, self.action, self.message
        )
    }
}

/// Receives logic crashes and votes on their fate.
pub trait CrashListener: Send + Sync {
    fn on_crash(&self, crash: &LogicCrash) -> CrashVote;
}

impl<F> CrashListener for F
where
    F: Fn(&LogicCrash) -> CrashVote + Send + Sync,
{
    fn on_crash(&self, crash: &LogicCrash) -> CrashVote {
        self(crash)
    }
}

#[derive(Default)]
pub(crate) struct CrashListeners {
    listeners: Mutex<Vec<Arc<dyn CrashListener>>>,
}

impl CrashListeners {
    pub(crate) fn add(&self, listener: Arc<dyn CrashListener>) {
        self.listeners.lock().push(listener);
    }

    pub(crate) fn clear(&self) {
        self.listeners.lock().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Notify every listener. Returns `true` if any voted to recover.
    pub(crate) fn notify(&self, crash: &LogicCrash) -> bool {
        let listeners = self.listeners.lock().clone();
        if listeners.is_empty() {
            tracing::error!(crash = %crash, "Logic crashed with no crash listener registered");
            return false;
        }

        let mut recovered = false;
        for listener in listeners {
            if listener.on_crash(crash) == CrashVote::Recover {
                recovered = true;
            }
        }

        if recovered {
            tracing::warn!(crash = %crash, "Logic crash recovered by listener");
        } else {
            tracing::error!(crash = %crash, "Logic crash propagated");
        }
        recovered
    }
}
