pub mod dashboard;

use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::domain::ViewModel;

/// Receives each successfully built view. Never sees failures.
pub trait Presenter: Send + Sync {
    fn update_ui(&self, view: Arc<ViewModel>);
}

/// Last published view, `None` until the first successful refresh
pub type ViewReceiver = watch::Receiver<Option<Arc<ViewModel>>>;

/// Single-writer handoff from the refresh task to whatever draws the screen
pub struct WatchPresenter {
    tx: watch::Sender<Option<Arc<ViewModel>>>,
}

impl WatchPresenter {
    pub fn new() -> (Self, ViewReceiver) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }

    pub fn subscribe(&self) -> ViewReceiver {
        self.tx.subscribe()
    }
}

impl Presenter for WatchPresenter {
    fn update_ui(&self, view: Arc<ViewModel>) {
        self.tx.send_replace(Some(view));
    }
}

/// The presenter's close action. Closing stops the refresh loop and lets the
/// shell exit.
#[derive(Debug, Clone, Default)]
pub struct WindowHandle {
    token: CancellationToken,
}

impl WindowHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn close_window(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn closed(&self) {
        self.token.cancelled().await
    }

    /// Token for tasks that must stop when the window closes
    pub fn shutdown_token(&self) -> CancellationToken {
        self.token.clone()
    }
}
