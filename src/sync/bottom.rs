use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

/// Scroll/intersection capability injected into a list controller.
///
/// The controller never inspects the viewport itself; it only waits for the
/// observer to report that the end of the rendered content is near.
#[async_trait]
pub trait BottomReachedNotifier: Send + Sync {
    /// Resolves when the bottom is reached. `false` once the observer is gone.
    async fn wait_for_bottom(&self) -> bool;
}

/// Notifier fed through a channel by whatever owns the viewport.
pub struct ChannelBottomNotifier {
    signals: Mutex<mpsc::Receiver<()>>,
}

impl ChannelBottomNotifier {
    /// Returns the notifier and the sender the observer signals through.
    pub fn new(buffer: usize) -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (
            Self {
                signals: Mutex::new(rx),
            },
            tx,
        )
    }
}

#[async_trait]
impl BottomReachedNotifier for ChannelBottomNotifier {
    async fn wait_for_bottom(&self) -> bool {
        self.signals.lock().await.recv().await.is_some()
    }
}
