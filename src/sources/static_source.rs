//! Fixed in-memory source.

use super::{DiscoverySource, SourceStream};
use crate::error::SourceError;
use crate::types::{AppSource, ApplicationRecord};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
enum Behavior {
    /// Yield every record, then end.
    Records,
    /// Yield every record, then fail with the message.
    FailAfter(String),
    /// Yield every record, then never end.
    Stall,
}

/// Yields a fixed list of records on every scan.
///
/// Useful for custom entries configured by hand, and in tests where
/// failing or hanging sources are needed.
#[derive(Debug, Clone)]
pub struct StaticSource {
    name: String,
    kind: AppSource,
    records: Vec<ApplicationRecord>,
    behavior: Behavior,
}

impl StaticSource {
    pub fn new(kind: AppSource, records: Vec<ApplicationRecord>) -> Self {
        Self {
            name: format!("static-{kind}"),
            kind,
            records,
            behavior: Behavior::Records,
        }
    }

    /// A source that fails immediately.
    pub fn failing(kind: AppSource, message: impl Into<String>) -> Self {
        Self::new(kind, Vec::new()).fail_after_records(message)
    }

    /// A source that never finishes, for cancellation tests.
    pub fn stalled(kind: AppSource) -> Self {
        Self {
            behavior: Behavior::Stall,
            ..Self::new(kind, Vec::new())
        }
    }

    /// Makes the source fail once its records are exhausted.
    #[must_use]
    pub fn fail_after_records(mut self, message: impl Into<String>) -> Self {
        self.behavior = Behavior::FailAfter(message.into());
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl DiscoverySource for StaticSource {
    fn kind(&self) -> AppSource {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn discover(&self, _cancel: CancellationToken) -> SourceStream {
        let records = stream::iter(self.records.clone().into_iter().map(Ok));
        match &self.behavior {
            Behavior::Records => records.boxed(),
            Behavior::FailAfter(message) => records
                .chain(stream::once(futures::future::ready(Err(
                    SourceError::Discovery(message.clone()),
                ))))
                .boxed(),
            Behavior::Stall => records.chain(stream::pending()).boxed(),
        }
    }
}
