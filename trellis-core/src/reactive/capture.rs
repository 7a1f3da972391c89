//! Error Containment
//!
//! Errors from watcher bodies (on re-runs) and callbacks are never thrown
//! through the scheduler. Instead they are offered, in order, to:
//!
//! 1. the error-capture hooks of the failing watcher's owner scope's
//!    ancestors, nearest first (the capture chain). A hook returning
//!    [`Capture::Stop`] claims the error;
//! 2. the runtime's global error handler, if one is set;
//! 3. the log. With a non-recoverable configuration the error is then
//!    returned to the caller.
//!
//! Dependency tracking is suspended for the whole walk so that reads done by
//! hooks never create subscriptions.

use std::sync::Arc;

use super::runtime::Runtime;
use super::scope::Scope;
use crate::error::{BoxError, ReactiveError};

/// What an error-capture hook decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// Keep walking up the chain.
    Propagate,
    /// The error is handled; stop.
    Stop,
}

/// Hook registered on a scope; receives the error and the scope the failing
/// watcher belongs to.
pub type ErrorCapturedHook =
    Arc<dyn Fn(&ReactiveError, &Scope) -> Result<Capture, BoxError> + Send + Sync>;

/// Runtime-wide fallback handler.
pub type ErrorHandler =
    Arc<dyn Fn(&ReactiveError, Option<&Scope>) -> Result<(), BoxError> + Send + Sync>;

/// Ancestor hooks of `owner`, nearest ancestor first, in registration order
/// within one scope. The owner's own hooks are not part of its chain.
pub fn capture_chain(owner: &Scope) -> Vec<(Scope, ErrorCapturedHook)> {
    owner
        .ancestors()
        .flat_map(|scope| {
            scope
                .error_captured_hooks()
                .into_iter()
                .map(move |hook| (scope.clone(), hook))
        })
        .collect()
}

pub(crate) fn handle_error(
    runtime: &Runtime,
    err: ReactiveError,
    owner: Option<&Scope>,
) -> Result<(), ReactiveError> {
    let _suspended = runtime.context().enter(None);

    if let Some(owner) = owner {
        for (scope, hook) in capture_chain(owner) {
            match hook(&err, owner) {
                Ok(Capture::Stop) => {
                    tracing::debug!(scope = scope.name(), error = %err, "error captured");
                    return Ok(());
                }
                Ok(Capture::Propagate) => {}
                Err(source) => {
                    let hook_err = ReactiveError::CaptureHook {
                        scope: scope.name().to_string(),
                        source,
                    };
                    global_handle_error(runtime, hook_err, Some(&scope))?;
                }
            }
        }
    }

    global_handle_error(runtime, err, owner)
}

fn global_handle_error(
    runtime: &Runtime,
    err: ReactiveError,
    scope: Option<&Scope>,
) -> Result<(), ReactiveError> {
    if let Some(handler) = runtime.error_handler() {
        match handler(&err, scope) {
            Ok(()) => return Ok(()),
            Err(handler_err) => {
                tracing::error!(error = %handler_err, "error in global error handler");
            }
        }
    }
    log_error(runtime, err, scope)
}

fn log_error(runtime: &Runtime, err: ReactiveError, scope: Option<&Scope>) -> Result<(), ReactiveError> {
    tracing::error!(
        error = %err,
        scope = ?scope.map(Scope::name),
        "unhandled error in {}",
        err.info()
    );
    if runtime.config().recoverable {
        Ok(())
    } else {
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use parking_lot::Mutex;

    fn callback_error(info: &str) -> ReactiveError {
        ReactiveError::Callback {
            info: info.to_string(),
            source: "boom".into(),
        }
    }

    #[test]
    fn chain_starts_at_parent() {
        let runtime = Runtime::new();
        let root = runtime.scope("root");
        let child = root.child("child");
        let leaf = child.child("leaf");

        leaf.on_error_captured(|_, _| Ok(Capture::Propagate));
        child.on_error_captured(|_, _| Ok(Capture::Propagate));
        root.on_error_captured(|_, _| Ok(Capture::Propagate));
        root.on_error_captured(|_, _| Ok(Capture::Propagate));

        let names: Vec<String> = capture_chain(&leaf)
            .into_iter()
            .map(|(scope, _)| scope.name().to_string())
            .collect();
        assert_eq!(names, vec!["child", "root", "root"]);
    }

    #[test]
    fn stop_halts_the_walk() {
        let runtime = Runtime::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let global_calls = Arc::new(Mutex::new(0));

        let root = runtime.scope("root");
        let child = root.child("child");
        let leaf = child.child("leaf");

        let seen_root = seen.clone();
        root.on_error_captured(move |_, _| {
            seen_root.lock().push("root");
            Ok(Capture::Propagate)
        });
        let seen_child = seen.clone();
        child.on_error_captured(move |_, origin| {
            seen_child.lock().push("child");
            assert_eq!(origin.name(), "leaf");
            Ok(Capture::Stop)
        });
        let global_clone = global_calls.clone();
        runtime.set_error_handler(move |_, _| {
            *global_clone.lock() += 1;
            Ok(())
        });

        handle_error(&runtime, callback_error("cb"), Some(&leaf)).unwrap();
        assert_eq!(*seen.lock(), vec!["child"]);
        assert_eq!(*global_calls.lock(), 0);
    }

    #[test]
    fn unclaimed_errors_reach_global_handler() {
        let runtime = Runtime::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        runtime.set_error_handler(move |err, scope| {
            received_clone
                .lock()
                .push((err.info().to_string(), scope.map(|s| s.name().to_string())));
            Ok(())
        });

        let scope = runtime.scope("solo");
        handle_error(&runtime, callback_error("cb"), Some(&scope)).unwrap();
        handle_error(&runtime, callback_error("bare"), None).unwrap();

        assert_eq!(
            *received.lock(),
            vec![("cb".to_string(), Some("solo".to_string())), ("bare".to_string(), None)]
        );
    }

    #[test]
    fn failing_hook_is_reported_and_walk_continues() {
        let runtime = Runtime::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        runtime.set_error_handler(move |err, _| {
            received_clone.lock().push(err.to_string());
            Ok(())
        });

        let root = runtime.scope("root");
        let child = root.child("child");
        child.on_error_captured(|_, _| Err("hook exploded".into()));

        let leaf = child.child("leaf");
        handle_error(&runtime, callback_error("cb"), Some(&leaf)).unwrap();

        let received = received.lock();
        assert_eq!(received.len(), 2);
        assert!(received[0].contains("hook exploded"));
        assert!(received[1].contains("error in cb"));
    }

    #[test]
    fn non_recoverable_runtime_surfaces_unclaimed_errors() {
        let runtime = Runtime::with_config(EngineConfig {
            recoverable: false,
            ..EngineConfig::default()
        });
        let err = handle_error(&runtime, callback_error("cb"), None).unwrap_err();
        assert_eq!(err.info(), "cb");

        runtime.set_error_handler(|_, _| Ok(()));
        assert!(handle_error(&runtime, callback_error("cb"), None).is_ok());

        runtime.set_error_handler(|_, _| Err("handler failed".into()));
        assert!(handle_error(&runtime, callback_error("cb"), None).is_err());
    }

    #[test]
    fn tracking_is_suspended_while_handling() {
        let runtime = Runtime::new();
        let tracking = Arc::new(Mutex::new(None));
        let tracking_clone = tracking.clone();
        let runtime_clone = runtime.clone();
        runtime.set_error_handler(move |_, _| {
            *tracking_clone.lock() = Some(runtime_clone.is_tracking());
            Ok(())
        });

        let _watcher = runtime
            .watcher({
                let runtime = runtime.clone();
                move || {
                    handle_error(&runtime, callback_error("inside"), None)?;
                    Ok(crate::reactive::Value::Null)
                }
            })
            .build()
            .unwrap();

        assert_eq!(*tracking.lock(), Some(false));
    }
}
