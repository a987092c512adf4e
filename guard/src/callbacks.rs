//! Hooks fired on circuit state transitions

use std::sync::Arc;

type TransitionHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Hooks called with the operation key whenever its circuit changes state
///
/// Transitions are logged whether or not a hook is set. Hooks run after the
/// circuit lock is released, so they may query the registry.
#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_open: Option<TransitionHook>,
    pub on_close: Option<TransitionHook>,
    pub on_half_open: Option<TransitionHook>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger_open(&self, key: &str) {
        tracing::warn!(key = %key, "circuit opened");
        fire(&self.on_open, key);
    }

    pub fn trigger_close(&self, key: &str) {
        tracing::info!(key = %key, "circuit closed");
        fire(&self.on_close, key);
    }

    pub fn trigger_half_open(&self, key: &str) {
        tracing::info!(key = %key, "circuit half-open, admitting trial call");
        fire(&self.on_half_open, key);
    }
}

fn fire(hook: &Option<TransitionHook>, key: &str) {
    if let Some(hook) = hook {
        hook(key);
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_half_open", &self.on_half_open.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_hooks_receive_key() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let opened = seen.clone();
        let closed = seen.clone();

        let callbacks = Callbacks {
            on_open: Some(Arc::new(move |key: &str| opened.lock().push(format!("open {key}")))),
            on_close: Some(Arc::new(move |key: &str| closed.lock().push(format!("close {key}")))),
            on_half_open: None,
        };

        callbacks.trigger_open("fetch-ratings");
        callbacks.trigger_half_open("fetch-ratings");
        callbacks.trigger_close("fetch-ratings");

        assert_eq!(
            *seen.lock(),
            vec!["open fetch-ratings".to_string(), "close fetch-ratings".to_string()]
        );
    }
}
