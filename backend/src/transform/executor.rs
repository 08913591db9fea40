//! Transformation driver
//!
//! Turns a sequence of source rows into protocol messages:
//!
//! 1. validate the mapping and resolve the emission strategy (once)
//! 2. for each row, coerce fields and build payloads
//! 3. stamp every payload with its own header
//!
//! Output order is row order, then payload order within the row. The first
//! coercion failure aborts the run; messages already built are discarded.

use super::header::{Clock, HeaderFactory, IdGenerator};
use super::strategy::{EmissionStrategy, TimestampSeeding};
use crate::error::{TransformError, TransformResult};
use crate::models::{EmissionPolicy, MappingSpec, Message, Row, StreamKind};

/// A mapping ready to be applied to rows.
#[derive(Debug)]
pub struct Transformer {
    mapping: MappingSpec,
    kind: StreamKind,
    strategy: EmissionStrategy,
    headers: HeaderFactory,
}

impl Transformer {
    /// Validate `mapping` and prepare a transformer for it.
    ///
    /// Fails with a configuration error before any row is looked at.
    pub fn new(mapping: &MappingSpec) -> TransformResult<Self> {
        let kind = mapping.validate()?;
        let strategy = EmissionStrategy::for_kind(kind, &mapping.group_tag, TimestampSeeding::default());
        let headers = HeaderFactory::new(&mapping.stream, mapping.version.clone())?;
        Ok(Self {
            mapping: mapping.clone(),
            kind,
            strategy,
            headers,
        })
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.headers = self.headers.with_clock(clock);
        self
    }

    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.headers = self.headers.with_id_generator(ids);
        self
    }

    /// Change how grouped payloads get their timestamp. No effect on flat streams.
    pub fn with_seeding(mut self, seeding: TimestampSeeding) -> Self {
        if let EmissionStrategy::Grouped { seeding: current, .. } = &mut self.strategy {
            *current = seeding;
        }
        self
    }

    pub fn mapping(&self) -> &MappingSpec {
        &self.mapping
    }

    pub fn stream_kind(&self) -> StreamKind {
        self.kind
    }

    pub fn policy(&self) -> EmissionPolicy {
        self.strategy.policy()
    }

    /// Messages for one row. `row_number` is 1-based and only used in errors.
    pub fn transform_row(&self, row_number: usize, row: &Row) -> TransformResult<Vec<Message>> {
        let payloads = self
            .strategy
            .emit(&self.mapping, row)
            .map_err(|e| e.with_row(row_number))?;

        Ok(payloads
            .into_iter()
            .map(|payload| Message {
                header: self.headers.make_header(),
                payload,
            })
            .collect())
    }

    /// Messages for all rows, in order.
    pub fn run(&self, rows: &[Row]) -> TransformResult<Vec<Message>> {
        let mut messages = Vec::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            messages.extend(self.transform_row(idx + 1, row)?);
        }
        Ok(messages)
    }
}

/// Apply `mapping` to `rows` with the system clock and random identifiers.
pub fn transform(mapping: &MappingSpec, rows: &[Row]) -> Result<Vec<Message>, TransformError> {
    Transformer::new(mapping)?.run(rows)
}
