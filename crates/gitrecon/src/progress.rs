use indicatif::{ProgressBar, ProgressStyle};
use std::borrow::Cow;
use std::time::Duration;

/// How often should progress bars be redrawn?
pub const PROGRESS_UPDATE_INTERVAL: Duration = Duration::from_millis(500);

/// A cloneable progress bar that is a no-op when disabled.
///
/// All clones share the same underlying bar, so worker threads can each hold one.
#[derive(Clone)]
pub struct Progress {
    inner: ProgressBar,
}

impl Progress {
    pub fn new_bar<T: Into<Cow<'static, str>>>(total: u64, message: T, enabled: bool) -> Self {
        let inner = if enabled {
            let style = ProgressStyle::with_template(
                "{msg}  {bar} {percent:>3}%  {pos}/{len}  [{elapsed_precise}]",
            )
            .expect("progress bar style template should compile");
            let inner = ProgressBar::new(total).with_style(style).with_message(message);
            inner.enable_steady_tick(PROGRESS_UPDATE_INTERVAL);
            inner
        } else {
            ProgressBar::hidden()
        };
        Progress { inner }
    }

    #[inline]
    pub fn inc(&self, delta: u64) {
        self.inner.inc(delta);
    }

    pub fn finish(&self) {
        self.inner.finish();
    }
}
