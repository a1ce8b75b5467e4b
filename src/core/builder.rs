use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

use super::controller::PoolController;
use crate::{
    config::PoolConfig,
    error::ConfigError,
    events::{Bus, Event},
    policies::JitterPolicy,
    stages::{Consumer, CounterRef, Crawler, Producer, Validator},
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for a [`PoolController`].
pub struct ControllerBuilder<C, V> {
    cfg: PoolConfig,
    counter: CounterRef,
    crawler: C,
    validator: V,
    subscribers: Vec<Arc<dyn Subscribe>>,
    jitter: JitterPolicy,
}

impl<C, V> PoolController<C, V>
where
    C: Crawler,
    V: Validator<Item = C::Item>,
{
    /// Starts building a controller from its three collaborators.
    pub fn builder(
        cfg: PoolConfig,
        counter: CounterRef,
        crawler: C,
        validator: V,
    ) -> ControllerBuilder<C, V> {
        ControllerBuilder::new(cfg, counter, crawler, validator)
    }
}

impl<C, V> ControllerBuilder<C, V>
where
    C: Crawler,
    V: Validator<Item = C::Item>,
{
    /// Creates a builder with no subscribers and full jitter.
    pub fn new(cfg: PoolConfig, counter: CounterRef, crawler: C, validator: V) -> Self {
        Self {
            cfg,
            counter,
            crawler,
            validator,
            subscribers: Vec::new(),
            jitter: JitterPolicy::default(),
        }
    }

    /// Sets event subscribers.
    ///
    /// Each one gets a dedicated worker with a bounded queue, so a slow
    /// subscriber never stalls a cycle.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one subscriber.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Overrides how the watchdog randomizes its poll interval.
    pub fn with_jitter(mut self, jitter: JitterPolicy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Validates the configuration and wires the controller.
    ///
    /// Must be called inside a Tokio runtime when subscribers are set.
    pub fn build(self) -> Result<PoolController<C, V>, ConfigError> {
        self.cfg.validate()?;

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let listener = (!self.subscribers.is_empty()).then(|| {
            let set = SubscriberSet::new(self.subscribers, bus.clone());
            let closed = CancellationToken::new();
            tokio::spawn(subscriber_listener(bus.subscribe(), set, closed.clone()));
            closed.drop_guard()
        });

        let consumer = Consumer::new(self.validator, self.cfg.workers_clamped(), bus.clone());
        Ok(PoolController {
            producer: Producer::new(self.crawler),
            consumer: Arc::new(consumer),
            counter: self.counter,
            jitter: self.jitter,
            cycles: AtomicU64::new(0),
            _listener: listener,
            cfg: self.cfg,
            bus,
        })
    }
}

/// Forwards bus events to the subscriber set until the controller is dropped.
async fn subscriber_listener(
    mut rx: broadcast::Receiver<Arc<Event>>,
    set: SubscriberSet,
    closed: CancellationToken,
) {
    loop {
        let ev = tokio::select! {
            biased;
            _ = closed.cancelled() => break,
            ev = rx.recv() => ev,
        };
        match ev {
            Ok(ev) => set.emit(ev),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "subscriber listener lagged behind the bus");
            }
            Err(RecvError::Closed) => break,
        }
    }
    set.shutdown().await;
}
