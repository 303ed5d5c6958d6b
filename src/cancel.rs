use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::foundation::error::{SlideError, SlideResult};

/// Cooperative cancellation flag shared by every stage of one deck request.
///
/// Clones observe the same flag. Long-running stages poll it between units of work, and
/// the encoder kills its `ffmpeg` child when it flips.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once [`CancelToken::cancel`] has been called.
    pub fn check(&self) -> SlideResult<()> {
        if self.is_cancelled() {
            Err(SlideError::Cancelled)
        } else {
            Ok(())
        }
    }
}
