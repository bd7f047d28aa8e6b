use tokio::sync::watch;

/// Fires the stop signal. Dropping the handle fires it as well.
#[derive(Debug)]
pub struct StopHandle {
    sender: watch::Sender<bool>,
}

#[derive(Debug, Clone)]
pub struct StopSignal {
    receiver: watch::Receiver<bool>,
}

pub fn stop_pair() -> (StopHandle, StopSignal) {
    let (sender, receiver) = watch::channel(false);
    (StopHandle { sender }, StopSignal { receiver })
}

impl StopHandle {
    pub fn stop(&self) {
        self.sender.send_replace(true);
    }
}

impl StopSignal {
    /// Resolves once the paired handle stopped or went away.
    pub async fn stopped(&mut self) {
        let _ = self.receiver.wait_for(|stopped| *stopped).await;
    }

    pub fn is_stopped(&self) -> bool {
        *self.receiver.borrow() || self.receiver.has_changed().is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn stop_wakes_every_clone() {
        let (handle, signal) = stop_pair();
        let mut first = signal.clone();
        let mut second = signal.clone();
        assert!(!signal.is_stopped());

        handle.stop();
        timeout(Duration::from_secs(1), first.stopped()).await.unwrap();
        timeout(Duration::from_secs(1), second.stopped()).await.unwrap();
        assert!(signal.is_stopped());
    }

    #[tokio::test]
    async fn dropping_the_handle_counts_as_stop() {
        let (handle, mut signal) = stop_pair();
        drop(handle);
        timeout(Duration::from_secs(1), signal.stopped()).await.unwrap();
        assert!(signal.is_stopped());
    }
}
