//! Protocol header construction.
//!
//! Every message gets its own header: a fresh identifier and a freshly
//! sampled send time. Both come from injected capabilities so the engine
//! stays deterministic under test.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ConfigurationError;
use crate::models::{Header, StreamCode};

/// Source of the wall-clock send time.
pub trait Clock: Send + Sync {
    /// Current UTC time in milliseconds since the UNIX epoch.
    fn now_millis(&self) -> i64;
}

/// Source of globally unique message identifiers.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Wall clock backed by `chrono::Utc::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Random UUID v4 identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Clock frozen at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0
    }
}

/// `prefix-1`, `prefix-2`, ... in call order.
#[derive(Debug, Default)]
pub struct SequentialIds {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}", self.prefix, n)
    }
}

/// Stamps payloads with headers for one stream.
pub struct HeaderFactory {
    code: StreamCode,
    version: String,
    clock: Box<dyn Clock>,
    ids: Box<dyn IdGenerator>,
}

impl std::fmt::Debug for HeaderFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeaderFactory")
            .field("code", &self.code)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl HeaderFactory {
    /// Factory using the system clock and random UUIDs.
    pub fn new(stream_spec: &str, version: impl Into<String>) -> Result<Self, ConfigurationError> {
        Ok(Self {
            code: StreamCode::parse(stream_spec)?,
            version: version.into(),
            clock: Box::new(SystemClock),
            ids: Box::new(UuidGenerator),
        })
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    pub fn code(&self) -> &StreamCode {
        &self.code
    }

    /// Build a new header; clock and id are sampled on every call.
    pub fn make_header(&self) -> Header {
        Header {
            stream: self.code.stream.clone(),
            function: self.code.function.clone(),
            message_id: self.ids.next_id(),
            protocol_version: self.version.clone(),
            sent_time: self.clock.now_millis(),
        }
    }
}

/// One-off header with the system clock and a random UUID.
pub fn make_header(stream_spec: &str, version: &str) -> Result<Header, ConfigurationError> {
    Ok(HeaderFactory::new(stream_spec, version)?.make_header())
}
