use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Duration;

pub const SEARCH_QUIET_PERIOD: Duration = Duration::from_millis(300);

/// Coalesces bursts of submissions: only the last value submitted before a quiet period
/// elapses is returned, earlier callers get `None`.
#[derive(Debug, Clone)]
pub struct Debouncer {
    quiet: Duration,
    generation: Arc<AtomicU64>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(SEARCH_QUIET_PERIOD)
    }
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn settle<T>(&self, value: T) -> Option<T> {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.quiet).await;
        (self.generation.load(Ordering::SeqCst) == ticket).then_some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::Debouncer;
    use tokio::time::Duration;

    #[tokio::test]
    async fn lone_submission_passes_through() {
        let debouncer = Debouncer::new(Duration::from_millis(10));
        assert_eq!(debouncer.settle("sap").await, Some("sap"));
    }

    #[tokio::test]
    async fn burst_yields_only_last_value() {
        let debouncer = Debouncer::new(Duration::from_millis(60));
        let typist = debouncer.clone();

        let (first, second, third) = tokio::join!(
            debouncer.settle("z"),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                typist.settle("ze").await
            },
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                typist.settle("zex").await
            },
        );

        assert_eq!(first, None);
        assert_eq!(second, None);
        assert_eq!(third, Some("zex"));
    }
}
