use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub type RequestId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Html,
    Css,
    Image,
    Script,
}

/// Whether a fetch carries credentials, derived from the `crossorigin` attribute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CredentialsMode {
    #[default]
    SameOrigin,
    Include,
}

/// Shared cancellation flag for one stream.
///
/// Cloning hands out another view of the same flag; aborting is sticky.
/// A child signal also reports aborted once its parent is.
#[derive(Clone, Debug, Default)]
pub struct AbortSignal {
    flag: Arc<AtomicBool>,
    parent: Option<Arc<AtomicBool>>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::clone(&self.flag)),
        }
    }

    pub fn abort(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.load(Ordering::Acquire))
    }
}
