//! Scripted collaborators shared by the unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StageError;
use crate::events::{Event, EventKind};
use crate::stages::{AtomicCounter, Crawler, ResourceCounter, Sink, Validator, Verdict};
use crate::subscribers::Subscribe;

/// Crawls a fixed list; the cursor survives across passes until `reset`.
pub(crate) struct ListCrawler {
    items: Vec<u32>,
    cursor: AtomicUsize,
    passes: AtomicUsize,
    fail_at: Option<(usize, StageError)>,
    panic_at: Option<usize>,
}

impl ListCrawler {
    pub(crate) fn new(items: Vec<u32>) -> Self {
        Self {
            items,
            cursor: AtomicUsize::new(0),
            passes: AtomicUsize::new(0),
            fail_at: None,
            panic_at: None,
        }
    }

    /// Returns `err` instead of putting the item at `index`.
    pub(crate) fn fail_at(mut self, index: usize, err: StageError) -> Self {
        self.fail_at = Some((index, err));
        self
    }

    /// Panics instead of putting the item at `index`.
    pub(crate) fn panic_at(mut self, index: usize) -> Self {
        self.panic_at = Some(index);
        self
    }

    pub(crate) fn passes(&self) -> usize {
        self.passes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Crawler for ListCrawler {
    type Item = u32;

    async fn crawl(&self, sink: &Sink<u32>) -> Result<(), StageError> {
        self.passes.fetch_add(1, Ordering::SeqCst);
        loop {
            if sink.is_stopped() {
                return Ok(());
            }
            let i = self.cursor.load(Ordering::SeqCst);
            let Some(&item) = self.items.get(i) else {
                return Ok(());
            };
            if let Some((at, err)) = &self.fail_at {
                if *at == i {
                    return Err(err.clone());
                }
            }
            if self.panic_at == Some(i) {
                panic!("crawler exploded at {i}");
            }
            sink.put(item).await?;
            self.cursor.store(i + 1, Ordering::SeqCst);
        }
    }

    fn reset(&self) {
        self.cursor.store(0, Ordering::SeqCst);
    }
}

/// Emits increasing ids every `pace` until stopped.
pub(crate) struct EndlessCrawler {
    next: AtomicU32,
    pace: Duration,
}

impl EndlessCrawler {
    pub(crate) fn new(pace: Duration) -> Self {
        Self {
            next: AtomicU32::new(1),
            pace,
        }
    }
}

#[async_trait]
impl Crawler for EndlessCrawler {
    type Item = u32;

    async fn crawl(&self, sink: &Sink<u32>) -> Result<(), StageError> {
        while !sink.is_stopped() {
            tokio::time::sleep(self.pace).await;
            sink.put(self.next.fetch_add(1, Ordering::SeqCst)).await?;
        }
        Ok(())
    }
}

/// Validator driven by item value; optionally persists accepted items into a counter.
#[derive(Default)]
pub(crate) struct ScriptedValidator {
    seen: AtomicU64,
    reject_even: bool,
    fail_on: Option<u32>,
    fatal_on: Option<u32>,
    panic_on: Option<u32>,
    persist: Option<(AtomicCounter, u64)>,
}

impl ScriptedValidator {
    pub(crate) fn accept_all() -> Self {
        Self::default()
    }

    pub(crate) fn reject_even(mut self) -> Self {
        self.reject_even = true;
        self
    }

    /// Soft failure for multiples of `n`.
    pub(crate) fn fail_on(mut self, n: u32) -> Self {
        self.fail_on = Some(n);
        self
    }

    /// Fatal failure for multiples of `n`.
    pub(crate) fn fatal_on(mut self, n: u32) -> Self {
        self.fatal_on = Some(n);
        self
    }

    /// Panics on multiples of `n`.
    pub(crate) fn panic_on(mut self, n: u32) -> Self {
        self.panic_on = Some(n);
        self
    }

    /// Adds `step` to `counter` for every accepted item.
    pub(crate) fn persist_into(mut self, counter: AtomicCounter, step: u64) -> Self {
        self.persist = Some((counter, step));
        self
    }

    pub(crate) fn seen(&self) -> u64 {
        self.seen.load(Ordering::SeqCst)
    }
}

fn hits(item: u32, rule: Option<u32>) -> bool {
    rule.is_some_and(|n| item % n == 0)
}

#[async_trait]
impl Validator for ScriptedValidator {
    type Item = u32;

    async fn validate(&self, item: u32) -> Result<Verdict, StageError> {
        self.seen.fetch_add(1, Ordering::SeqCst);
        if hits(item, self.panic_on) {
            panic!("validator exploded on {item}");
        }
        if hits(item, self.fatal_on) {
            return Err(StageError::fatal(format!("item {item} poisoned the store")));
        }
        if hits(item, self.fail_on) {
            return Err(StageError::fail(format!("item {item} timed out")));
        }
        if self.reject_even && item % 2 == 0 {
            return Ok(Verdict::Rejected);
        }
        if let Some((counter, step)) = &self.persist {
            counter.add(*step);
        }
        Ok(Verdict::Accepted)
    }
}

/// Counter replaying scripted values; the last one repeats forever.
pub(crate) struct ScriptedCounter {
    values: Vec<u64>,
    reads: AtomicUsize,
    fail_first: usize,
    error: Option<StageError>,
}

impl ScriptedCounter {
    pub(crate) fn new(values: Vec<u64>) -> Self {
        assert!(!values.is_empty(), "script needs at least one value");
        Self {
            values,
            reads: AtomicUsize::new(0),
            fail_first: 0,
            error: None,
        }
    }

    /// The first `n` reads return `err`.
    pub(crate) fn fail_first(mut self, n: usize, err: StageError) -> Self {
        self.fail_first = n;
        self.error = Some(err);
        self
    }

    pub(crate) fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceCounter for ScriptedCounter {
    async fn count(&self) -> Result<u64, StageError> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_first {
            if let Some(err) = &self.error {
                return Err(err.clone());
            }
        }
        let idx = n.saturating_sub(self.fail_first).min(self.values.len() - 1);
        Ok(self.values[idx])
    }
}

/// Subscriber remembering the kind of every event it sees.
#[derive(Default)]
pub(crate) struct Recorder {
    kinds: Mutex<Vec<EventKind>>,
}

impl Recorder {
    pub(crate) fn kinds(&self) -> Vec<EventKind> {
        self.kinds.lock().unwrap().clone()
    }
}

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, event: &Event) {
        self.kinds.lock().unwrap().push(event.kind);
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}
