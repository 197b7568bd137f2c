//! Side channels the registry reports to but never depends on.

use std::sync::Arc;

/// success/error reporting, e.g. toasts
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str) -> anyhow::Result<()>;
    fn error(&self, message: &str, caption: Option<&str>) -> anyhow::Result<()>;
}

/// background workers that may trigger activation on their own
pub trait Pollers: Send + Sync {
    /// called before an activation takes the lock
    fn clear_all_workers(&self);
}

/// drops every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Notifier for Silent {
    fn success(&self, _message: &str) -> anyhow::Result<()> {
        Ok(())
    }
    fn error(&self, _message: &str, _caption: Option<&str>) -> anyhow::Result<()> {
        Ok(())
    }
}

impl Pollers for Silent {
    fn clear_all_workers(&self) {}
}

/// notifications go to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn success(&self, message: &str) -> anyhow::Result<()> {
        info!("{}", message);
        Ok(())
    }
    fn error(&self, message: &str, caption: Option<&str>) -> anyhow::Result<()> {
        match caption {
            Some(c) => error!("{}: {}", c, message),
            None => error!("{}", message),
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct Hooks {
    pub notifier: Arc<dyn Notifier>,
    pub pollers: Arc<dyn Pollers>,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            notifier: Arc::new(Silent),
            pollers: Arc::new(Silent),
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}

impl Hooks {
    /// A failing notifier is logged and otherwise ignored.
    pub fn notify_success(&self, message: &str) {
        if let Err(e) = self.notifier.success(message) {
            warn!("notify success {:?} failed: {}", message, e);
        }
    }

    pub fn notify_error(&self, message: &str, caption: Option<&str>) {
        if let Err(e) = self.notifier.error(message, caption) {
            warn!("notify error {:?} failed: {}", message, e);
        }
    }

    pub fn clear_all_workers(&self) {
        self.pollers.clear_all_workers()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// records every call, optionally failing each notification
    #[derive(Debug, Default)]
    pub struct Recorder {
        pub broken: bool,
        pub successes: Mutex<Vec<String>>,
        pub errors: Mutex<Vec<String>>,
        pub clears: AtomicUsize,
    }

    impl Recorder {
        pub fn broken() -> Self {
            Self {
                broken: true,
                ..Default::default()
            }
        }

        pub fn successes(&self) -> Vec<String> {
            self.successes.lock().unwrap().clone()
        }

        pub fn errors(&self) -> Vec<String> {
            self.errors.lock().unwrap().clone()
        }

        pub fn clears(&self) -> usize {
            self.clears.load(Ordering::SeqCst)
        }
    }

    impl Notifier for Recorder {
        fn success(&self, message: &str) -> anyhow::Result<()> {
            self.successes.lock().unwrap().push(message.to_owned());
            if self.broken {
                bail!("toast queue closed");
            }
            Ok(())
        }
        fn error(&self, message: &str, _caption: Option<&str>) -> anyhow::Result<()> {
            self.errors.lock().unwrap().push(message.to_owned());
            if self.broken {
                bail!("toast queue closed");
            }
            Ok(())
        }
    }

    impl Pollers for Recorder {
        fn clear_all_workers(&self) {
            self.clears.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn hooks(r: &Arc<Recorder>) -> Hooks {
        Hooks {
            notifier: r.clone(),
            pollers: r.clone(),
        }
    }

    #[test]
    fn test_broken_notifier_swallowed() {
        let r = Arc::new(Recorder::broken());
        let h = hooks(&r);
        h.notify_success("Mint added");
        h.notify_error("Could not get mint keys", Some("Error"));
        h.clear_all_workers();

        assert_eq!(r.successes(), vec!["Mint added".to_owned()]);
        assert_eq!(r.errors().len(), 1);
        assert_eq!(r.clears(), 1);
    }
}
