use crate::{Event, Product, Source, adapter};

use futures::stream::{AbortHandle, Abortable, BoxStream, abortable};

/// A live ticker subscription owned by its caller.
///
/// [`FeedSession::start`] hands out the event stream; [`FeedSession::stop`] (or dropping the
/// session) ends it, after which the stream yields nothing more.
#[derive(Debug)]
pub struct FeedSession {
    source: Source,
    product: Product,
    handle: Option<AbortHandle>,
}

impl FeedSession {
    pub fn new(source: Source, product: Product) -> Self {
        Self {
            source,
            product,
            handle: None,
        }
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn product(&self) -> &Product {
        &self.product
    }

    /// Starts a fresh subscription, stopping any previous one first.
    pub fn start(&mut self) -> Abortable<BoxStream<'static, Event>> {
        self.stop();

        let (stream, handle) =
            abortable(adapter::connect_ticker_stream(self.source, self.product.clone()));
        self.handle = Some(handle);

        log::info!("Started {} ticker feed for {}", self.source, self.product);
        stream
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            log::info!("Stopped {} ticker feed for {}", self.source, self.product);
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_aborted())
    }
}

impl Drop for FeedSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn session() -> FeedSession {
        FeedSession::new(Source::Synthetic, Product::new("DEMO-USD").unwrap())
    }

    #[tokio::test]
    async fn synthetic_feed_connects_then_ticks() {
        let mut session = session();
        let mut events = session.start();

        assert_eq!(events.next().await, Some(Event::Connected(Source::Synthetic)));
        assert!(matches!(events.next().await, Some(Event::Tick(_, tick)) if tick.price.is_finite()));
        assert!(session.is_running());
    }

    #[tokio::test]
    async fn stop_ends_the_stream() {
        let mut session = session();
        let mut events = session.start();

        session.stop();

        assert!(!session.is_running());
        assert_eq!(events.next().await, None);
    }

    #[tokio::test]
    async fn restart_aborts_previous_stream() {
        let mut session = session();
        let mut first = session.start();
        let _second = session.start();

        assert_eq!(first.next().await, None);
        assert!(session.is_running());
    }

    #[tokio::test]
    async fn dropping_session_ends_the_stream() {
        let mut events = {
            let mut session = session();
            session.start()
        };

        assert_eq!(events.next().await, None);
    }
}
