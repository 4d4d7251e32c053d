//! Per-stream batching between the extractor and its sinks.
//!
//! The dispatcher keeps one buffer for each [`PrimitiveKind`]. Records are
//! delivered to the sink in document order, in batches of at most the
//! configured size. At end-of-stream every accepted stream is flushed: a
//! partial batch is delivered if anything remains, and a stream that never
//! produced a record receives a single empty batch so sinks still observe its
//! end.

use std::fmt;
use std::num::NonZeroUsize;

use thiserror::Error;

use crate::{Coordinate, Primitive, PrimitiveKind, Relation, TaggedNode, Way};

/// Batch size used when none is configured.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Maximum number of records delivered to a sink in one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSize(NonZeroUsize);

/// Error returned for a zero batch size.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("batch size must be at least 1")]
pub struct ZeroBatchSize;

impl BatchSize {
    /// Validate a batch size.
    ///
    /// # Errors
    /// Returns [`ZeroBatchSize`] when `size` is zero.
    pub fn new(size: usize) -> Result<Self, ZeroBatchSize> {
        NonZeroUsize::new(size).map(Self).ok_or(ZeroBatchSize)
    }

    /// The size as a plain integer.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for BatchSize {
    fn default() -> Self {
        Self(NonZeroUsize::MIN.saturating_add(DEFAULT_BATCH_SIZE - 1))
    }
}

/// Receiver for batches of extracted records.
///
/// Implementers decide which streams they consume through
/// [`PrimitiveSink::accepts`]; records for other streams are discarded without
/// being buffered.
pub trait PrimitiveSink {
    /// Error returned when a batch cannot be consumed.
    type Error;

    /// Whether the sink consumes records of `kind`.
    fn accepts(&self, kind: PrimitiveKind) -> bool {
        let _ = kind;
        true
    }

    /// Consume a batch of tagged nodes.
    ///
    /// # Errors
    /// Implementation-defined; the error aborts extraction.
    fn nodes(&mut self, batch: Vec<TaggedNode>) -> Result<(), Self::Error>;

    /// Consume a batch of coordinates.
    ///
    /// # Errors
    /// Implementation-defined; the error aborts extraction.
    fn coordinates(&mut self, batch: Vec<Coordinate>) -> Result<(), Self::Error>;

    /// Consume a batch of ways.
    ///
    /// # Errors
    /// Implementation-defined; the error aborts extraction.
    fn ways(&mut self, batch: Vec<Way>) -> Result<(), Self::Error>;

    /// Consume a batch of relations.
    ///
    /// # Errors
    /// Implementation-defined; the error aborts extraction.
    fn relations(&mut self, batch: Vec<Relation>) -> Result<(), Self::Error>;
}

/// Delivery counters for one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Records delivered.
    pub records: u64,
    /// Sink invocations, including an empty end-of-stream batch.
    pub batches: u64,
}

/// Delivery counters for all four streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Tagged node stream.
    pub nodes: StreamStats,
    /// Coordinate stream.
    pub coordinates: StreamStats,
    /// Way stream.
    pub ways: StreamStats,
    /// Relation stream.
    pub relations: StreamStats,
}

impl DispatchStats {
    /// Counters for the given stream.
    #[must_use]
    pub const fn stream(&self, kind: PrimitiveKind) -> StreamStats {
        match kind {
            PrimitiveKind::Node => self.nodes,
            PrimitiveKind::Coordinate => self.coordinates,
            PrimitiveKind::Way => self.ways,
            PrimitiveKind::Relation => self.relations,
        }
    }

    fn record(&mut self, kind: PrimitiveKind, delivered: usize) {
        let stats = match kind {
            PrimitiveKind::Node => &mut self.nodes,
            PrimitiveKind::Coordinate => &mut self.coordinates,
            PrimitiveKind::Way => &mut self.ways,
            PrimitiveKind::Relation => &mut self.relations,
        };
        stats.records = stats
            .records
            .saturating_add(u64::try_from(delivered).unwrap_or(u64::MAX));
        stats.batches = stats.batches.saturating_add(1);
    }
}

/// Buffers records per stream and hands full batches to a [`PrimitiveSink`].
///
/// # Examples
/// ```
/// use osmlite_core::{BatchDispatcher, BatchSize, CallbackSinks, Coordinate, Primitive};
///
/// let mut batches = Vec::new();
/// let sinks = CallbackSinks::<std::convert::Infallible>::new()
///     .on_coordinates(|batch| {
///         batches.push(batch.len());
///         Ok(())
///     });
/// let mut dispatcher = BatchDispatcher::new(sinks, BatchSize::new(2).expect("non-zero"));
/// for id in 0..5 {
///     let coordinate = Coordinate { id, lon: 0.0, lat: 0.0 };
///     dispatcher.offer(Primitive::Coordinate(coordinate)).expect("infallible sink");
/// }
/// let (_, stats) = dispatcher.finish().expect("infallible sink");
///
/// assert_eq!(stats.coordinates.batches, 3);
/// assert_eq!(batches, vec![2, 2, 1]);
/// ```
pub struct BatchDispatcher<S> {
    sink: S,
    capacity: usize,
    nodes: Vec<TaggedNode>,
    coordinates: Vec<Coordinate>,
    ways: Vec<Way>,
    relations: Vec<Relation>,
    stats: DispatchStats,
}

impl<S> fmt::Debug for BatchDispatcher<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchDispatcher")
            .field("capacity", &self.capacity)
            .field("buffered_nodes", &self.nodes.len())
            .field("buffered_coordinates", &self.coordinates.len())
            .field("buffered_ways", &self.ways.len())
            .field("buffered_relations", &self.relations.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<S: PrimitiveSink> BatchDispatcher<S> {
    /// Create a dispatcher delivering to `sink` in batches of `batch_size`.
    pub fn new(sink: S, batch_size: BatchSize) -> Self {
        Self {
            sink,
            capacity: batch_size.get(),
            nodes: Vec::new(),
            coordinates: Vec::new(),
            ways: Vec::new(),
            relations: Vec::new(),
            stats: DispatchStats::default(),
        }
    }

    /// Append a record to its stream, delivering the batch once it is full.
    ///
    /// # Errors
    /// Propagates the sink's error for the delivered batch.
    pub fn offer(&mut self, record: Primitive) -> Result<(), S::Error> {
        let kind = record.kind();
        if !self.sink.accepts(kind) {
            return Ok(());
        }
        match record {
            Primitive::Node(node) => {
                if let Some(batch) = push_until_full(&mut self.nodes, node, self.capacity) {
                    self.stats.record(kind, batch.len());
                    self.sink.nodes(batch)?;
                }
            }
            Primitive::Coordinate(coordinate) => {
                if let Some(batch) =
                    push_until_full(&mut self.coordinates, coordinate, self.capacity)
                {
                    self.stats.record(kind, batch.len());
                    self.sink.coordinates(batch)?;
                }
            }
            Primitive::Way(way) => {
                if let Some(batch) = push_until_full(&mut self.ways, way, self.capacity) {
                    self.stats.record(kind, batch.len());
                    self.sink.ways(batch)?;
                }
            }
            Primitive::Relation(relation) => {
                if let Some(batch) = push_until_full(&mut self.relations, relation, self.capacity)
                {
                    self.stats.record(kind, batch.len());
                    self.sink.relations(batch)?;
                }
            }
        }
        Ok(())
    }

    /// Deliver whatever remains in each accepted stream.
    ///
    /// # Errors
    /// Propagates the first sink error; later streams are not flushed.
    pub fn flush(&mut self) -> Result<(), S::Error> {
        for kind in PrimitiveKind::ALL {
            if !self.sink.accepts(kind) || !self.needs_final_batch(kind) {
                continue;
            }
            match kind {
                PrimitiveKind::Node => {
                    let batch = std::mem::take(&mut self.nodes);
                    self.stats.record(kind, batch.len());
                    self.sink.nodes(batch)?;
                }
                PrimitiveKind::Coordinate => {
                    let batch = std::mem::take(&mut self.coordinates);
                    self.stats.record(kind, batch.len());
                    self.sink.coordinates(batch)?;
                }
                PrimitiveKind::Way => {
                    let batch = std::mem::take(&mut self.ways);
                    self.stats.record(kind, batch.len());
                    self.sink.ways(batch)?;
                }
                PrimitiveKind::Relation => {
                    let batch = std::mem::take(&mut self.relations);
                    self.stats.record(kind, batch.len());
                    self.sink.relations(batch)?;
                }
            }
        }
        Ok(())
    }

    /// Flush every stream and hand back the sink with delivery counters.
    ///
    /// # Errors
    /// Propagates the sink's error for the final batches.
    pub fn finish(mut self) -> Result<(S, DispatchStats), S::Error> {
        self.flush()?;
        Ok((self.sink, self.stats))
    }

    /// Counters for batches delivered so far.
    #[must_use]
    pub const fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Borrow the sink.
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    fn needs_final_batch(&self, kind: PrimitiveKind) -> bool {
        let buffered = match kind {
            PrimitiveKind::Node => self.nodes.len(),
            PrimitiveKind::Coordinate => self.coordinates.len(),
            PrimitiveKind::Way => self.ways.len(),
            PrimitiveKind::Relation => self.relations.len(),
        };
        buffered > 0 || self.stats.stream(kind).batches == 0
    }
}

fn push_until_full<T>(buffer: &mut Vec<T>, item: T, capacity: usize) -> Option<Vec<T>> {
    buffer.push(item);
    (buffer.len() >= capacity).then(|| std::mem::replace(buffer, Vec::with_capacity(capacity)))
}

type Callback<'a, T, E> = Box<dyn FnMut(Vec<T>) -> Result<(), E> + 'a>;

/// A [`PrimitiveSink`] assembled from optional per-stream closures.
///
/// Streams without a closure are not accepted, so their records are never
/// buffered.
pub struct CallbackSinks<'a, E> {
    nodes: Option<Callback<'a, TaggedNode, E>>,
    coordinates: Option<Callback<'a, Coordinate, E>>,
    ways: Option<Callback<'a, Way, E>>,
    relations: Option<Callback<'a, Relation, E>>,
}

impl<E> Default for CallbackSinks<'_, E> {
    fn default() -> Self {
        Self {
            nodes: None,
            coordinates: None,
            ways: None,
            relations: None,
        }
    }
}

impl<E> fmt::Debug for CallbackSinks<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSinks")
            .field("nodes", &self.nodes.is_some())
            .field("coordinates", &self.coordinates.is_some())
            .field("ways", &self.ways.is_some())
            .field("relations", &self.relations.is_some())
            .finish()
    }
}

impl<'a, E> CallbackSinks<'a, E> {
    /// A sink that accepts nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the tagged node callback.
    #[must_use]
    pub fn on_nodes<F>(mut self, callback: F) -> Self
    where
        F: FnMut(Vec<TaggedNode>) -> Result<(), E> + 'a,
    {
        self.nodes = Some(Box::new(callback));
        self
    }

    /// Register the coordinate callback.
    #[must_use]
    pub fn on_coordinates<F>(mut self, callback: F) -> Self
    where
        F: FnMut(Vec<Coordinate>) -> Result<(), E> + 'a,
    {
        self.coordinates = Some(Box::new(callback));
        self
    }

    /// Register the way callback.
    #[must_use]
    pub fn on_ways<F>(mut self, callback: F) -> Self
    where
        F: FnMut(Vec<Way>) -> Result<(), E> + 'a,
    {
        self.ways = Some(Box::new(callback));
        self
    }

    /// Register the relation callback.
    #[must_use]
    pub fn on_relations<F>(mut self, callback: F) -> Self
    where
        F: FnMut(Vec<Relation>) -> Result<(), E> + 'a,
    {
        self.relations = Some(Box::new(callback));
        self
    }
}

impl<E> PrimitiveSink for CallbackSinks<'_, E> {
    type Error = E;

    fn accepts(&self, kind: PrimitiveKind) -> bool {
        match kind {
            PrimitiveKind::Node => self.nodes.is_some(),
            PrimitiveKind::Coordinate => self.coordinates.is_some(),
            PrimitiveKind::Way => self.ways.is_some(),
            PrimitiveKind::Relation => self.relations.is_some(),
        }
    }

    fn nodes(&mut self, batch: Vec<TaggedNode>) -> Result<(), E> {
        self.nodes.as_mut().map_or(Ok(()), |callback| callback(batch))
    }

    fn coordinates(&mut self, batch: Vec<Coordinate>) -> Result<(), E> {
        self.coordinates
            .as_mut()
            .map_or(Ok(()), |callback| callback(batch))
    }

    fn ways(&mut self, batch: Vec<Way>) -> Result<(), E> {
        self.ways.as_mut().map_or(Ok(()), |callback| callback(batch))
    }

    fn relations(&mut self, batch: Vec<Relation>) -> Result<(), E> {
        self.relations
            .as_mut()
            .map_or(Ok(()), |callback| callback(batch))
    }
}

impl<S: PrimitiveSink + ?Sized> PrimitiveSink for &mut S {
    type Error = S::Error;

    fn accepts(&self, kind: PrimitiveKind) -> bool {
        (**self).accepts(kind)
    }

    fn nodes(&mut self, batch: Vec<TaggedNode>) -> Result<(), Self::Error> {
        (**self).nodes(batch)
    }

    fn coordinates(&mut self, batch: Vec<Coordinate>) -> Result<(), Self::Error> {
        (**self).coordinates(batch)
    }

    fn ways(&mut self, batch: Vec<Way>) -> Result<(), Self::Error> {
        (**self).ways(batch)
    }

    fn relations(&mut self, batch: Vec<Relation>) -> Result<(), Self::Error> {
        (**self).relations(batch)
    }
}
