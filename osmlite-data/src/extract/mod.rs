//! Streaming extraction of OSM XML documents.
//!
//! The extractor makes a single forward pass with `quick-xml`, reusing one
//! event buffer for the whole document. Each closed `node`, `way` or
//! `relation` is turned into records and offered to a [`BatchDispatcher`]
//! in document order. Tagged nodes are emitted twice: once on the node
//! stream and once as a bare coordinate.
//!
//! A document must consist of a single `<osm>` root element that is closed
//! before the input ends. Empty input, stray text and a cut-off root are all
//! reported as malformed.

use std::io::{BufRead, BufReader};
use std::str::FromStr;

use bzip2::read::MultiBzDecoder;
use camino::{Utf8Path, Utf8PathBuf};
use geo::{Coord, Rect};
use log::info;
use osmlite_core::{
    BatchDispatcher, Coordinate, DispatchStats, Member, MemberType, Primitive, PrimitiveSink,
    Relation, TaggedNode, Tags, UnknownMemberType, Way,
};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

/// Counts and extent of the primitives seen in a document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractSummary {
    /// Nodes seen, tagged or not.
    pub nodes: u64,
    /// Nodes carrying at least one tag.
    pub tagged_nodes: u64,
    /// Ways seen.
    pub ways: u64,
    /// Relations seen.
    pub relations: u64,
    /// Bounding box covering all valid node coordinates.
    /// Coordinates are WGS84 with `x = longitude`, `y = latitude`.
    pub bounds: Option<Rect<f64>>,
}

impl ExtractSummary {
    fn include_bounds(&mut self, bounds: Rect<f64>) {
        match &mut self.bounds {
            Some(existing) => {
                let min = Coord {
                    x: existing.min().x.min(bounds.min().x),
                    y: existing.min().y.min(bounds.min().y),
                };
                let max = Coord {
                    x: existing.max().x.max(bounds.max().x),
                    y: existing.max().y.max(bounds.max().y),
                };
                *existing = Rect::new(min, max);
            }
            None => self.bounds = Some(bounds),
        }
    }

    fn record_node(&mut self, lon: f64, lat: f64, tagged: bool) {
        self.nodes += 1;
        if tagged {
            self.tagged_nodes += 1;
        }
        if let Some(bounds) = Self::coordinate_bounds(lon, lat) {
            self.include_bounds(bounds);
        }
    }

    fn coordinate_bounds(lon: f64, lat: f64) -> Option<Rect<f64>> {
        (lon.is_finite()
            && lat.is_finite()
            && (-180.0..=180.0).contains(&lon)
            && (-90.0..=90.0).contains(&lat))
        .then(|| {
            let coordinate = Coord { x: lon, y: lat };
            Rect::new(coordinate, coordinate)
        })
    }
}

/// Result of a completed extraction.
#[derive(Debug)]
pub struct Extraction<S> {
    /// The sink, handed back after the final flush.
    pub sink: S,
    /// Counts of the primitives seen.
    pub summary: ExtractSummary,
    /// Batches and records delivered per stream.
    pub dispatch: DispatchStats,
}

/// Structural problems that make a document unusable.
#[derive(Debug, Error)]
pub enum MalformedReason {
    /// A required attribute is absent.
    #[error("<{element}> is missing the {attribute:?} attribute")]
    MissingAttribute {
        /// Element name.
        element: &'static str,
        /// Attribute name.
        attribute: &'static str,
    },
    /// An attribute value could not be parsed.
    #[error("<{element}> has an invalid {attribute:?} value {value:?}")]
    InvalidAttribute {
        /// Element name.
        element: &'static str,
        /// Attribute name.
        attribute: &'static str,
        /// Raw value.
        value: String,
    },
    /// Attribute syntax could not be decoded.
    #[error("<{element}> has unreadable attributes: {detail}")]
    AttributeSyntax {
        /// Element name.
        element: &'static str,
        /// Decoder message.
        detail: String,
    },
    /// A relation member names an unknown primitive type.
    #[error(transparent)]
    MemberType(#[from] UnknownMemberType),
    /// A primitive element opened inside another primitive.
    #[error("<{inner}> is nested inside <{outer}>")]
    NestedPrimitive {
        /// Enclosing primitive.
        outer: &'static str,
        /// Offending element.
        inner: &'static str,
    },
    /// The document ended before an element was closed.
    #[error("document ended inside <{element}>")]
    Unterminated {
        /// Unclosed primitive, or `osm` for the root.
        element: &'static str,
    },
    /// The input held no root element at all.
    #[error("document has no <osm> root element")]
    MissingRoot,
    /// The root element is not `<osm>`.
    #[error("root element is <{found}>, expected <osm>")]
    UnexpectedRoot {
        /// Name of the root element found.
        found: String,
    },
    /// Text or a second element appeared outside the root.
    #[error("content found outside the <osm> root element")]
    ContentOutsideRoot,
}

/// Errors raised while extracting primitives.
#[derive(Debug, Error)]
pub enum ExtractError<E> {
    /// Opening the document failed.
    #[error("failed to open OSM document at {path}")]
    Open {
        /// Document path.
        path: Utf8PathBuf,
        /// Source error from std I/O.
        #[source]
        source: std::io::Error,
    },
    /// Reading or tokenising the document failed.
    #[error("failed to read OSM XML near byte {position}")]
    Read {
        /// Byte offset reached when the error occurred.
        position: usize,
        /// Source error from `quick-xml`.
        #[source]
        source: quick_xml::Error,
    },
    /// The XML is well formed but is not a usable OSM document.
    #[error("malformed OSM document near byte {position}")]
    Malformed {
        /// Byte offset of the offending element.
        position: usize,
        /// What was wrong.
        #[source]
        reason: MalformedReason,
    },
    /// The sink failed to consume a batch.
    #[error("failed to deliver extracted records")]
    Sink {
        /// Source error from the sink.
        #[source]
        source: E,
    },
}

/// Report whether `path` names a bzip2-compressed file.
#[must_use]
pub fn is_bz2(path: &Utf8Path) -> bool {
    path.extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("bz2"))
}

/// Extract primitives from the OSM XML file at `path`.
///
/// Files ending in `.bz2` are decompressed on the fly.
///
/// # Errors
/// See [`extract_primitives`]; additionally returns
/// [`ExtractError::Open`] when the file cannot be opened.
pub fn extract_file<S: PrimitiveSink>(
    path: &Utf8Path,
    dispatcher: BatchDispatcher<S>,
) -> Result<Extraction<S>, ExtractError<S::Error>> {
    let file = osmlite_fs::open_utf8_file(path).map_err(|source| ExtractError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let extraction = if is_bz2(path) {
        extract_primitives(BufReader::new(MultiBzDecoder::new(file)), dispatcher)?
    } else {
        extract_primitives(BufReader::new(file), dispatcher)?
    };
    info!(
        "extracted {} nodes ({} tagged), {} ways and {} relations from {path}",
        extraction.summary.nodes,
        extraction.summary.tagged_nodes,
        extraction.summary.ways,
        extraction.summary.relations,
    );
    Ok(extraction)
}

/// Extract primitives from an OSM XML byte stream.
///
/// Records are offered to `dispatcher` as their elements close; the
/// dispatcher is flushed once the document ends.
///
/// # Errors
/// Returns [`ExtractError::Read`] for XML syntax and I/O failures,
/// [`ExtractError::Malformed`] for structural problems and
/// [`ExtractError::Sink`] when the sink rejects a batch. Extraction stops at
/// the first error.
///
/// # Examples
/// ```
/// use osmlite_core::{BatchDispatcher, BatchSize, CallbackSinks};
/// use osmlite_data::extract_primitives;
///
/// let document = br#"<osm>
///   <node id="1" lat="51.5" lon="-0.1"><tag k="amenity" v="cafe"/></node>
///   <node id="2" lat="51.6" lon="-0.2"/>
/// </osm>"#;
/// let mut coordinates = Vec::new();
/// let sinks = CallbackSinks::<std::convert::Infallible>::new().on_coordinates(|batch| {
///     coordinates.extend(batch.into_iter().map(|c| c.id));
///     Ok(())
/// });
/// let extraction = extract_primitives(&document[..], BatchDispatcher::new(sinks, BatchSize::default()))
///     .expect("valid document");
///
/// assert_eq!(extraction.summary.tagged_nodes, 1);
/// drop(extraction);
/// assert_eq!(coordinates, vec![1, 2]);
/// ```
pub fn extract_primitives<R: BufRead, S: PrimitiveSink>(
    source: R,
    dispatcher: BatchDispatcher<S>,
) -> Result<Extraction<S>, ExtractError<S::Error>> {
    let mut reader = Reader::from_reader(source);
    reader.trim_text(true);
    let mut extractor = Extractor {
        dispatcher,
        summary: ExtractSummary::default(),
        open: OpenElement::None,
    };
    let mut root = Root::Pending;
    let mut buf = Vec::new();

    loop {
        let position = reader.buffer_position();
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|source| ExtractError::Read {
                position: reader.buffer_position(),
                source,
            })?;
        let malformed = |reason: MalformedReason| -> ExtractError<S::Error> {
            ExtractError::Malformed { position, reason }
        };
        match event {
            Event::Start(element) => {
                root.start(element.name().as_ref(), false)
                    .map_err(malformed)?;
                extractor.open(&element, position, false)?;
            }
            Event::Empty(element) => {
                root.start(element.name().as_ref(), true)
                    .map_err(malformed)?;
                extractor.open(&element, position, true)?;
            }
            Event::End(element) => {
                root.end();
                if extractor.open.closes_with(element.name().as_ref()) {
                    extractor.close()?;
                }
            }
            Event::Text(text) => root.text(&text).map_err(malformed)?,
            Event::CData(data) => root.text(&data).map_err(malformed)?,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let end = reader.buffer_position();
    if let Some(element) = extractor.open.name() {
        return Err(ExtractError::Malformed {
            position: end,
            reason: MalformedReason::Unterminated { element },
        });
    }
    root.finish().map_err(|reason| ExtractError::Malformed {
        position: end,
        reason,
    })?;
    let Extractor {
        dispatcher,
        summary,
        ..
    } = extractor;
    let (sink, dispatch) = dispatcher
        .finish()
        .map_err(|source| ExtractError::Sink { source })?;
    Ok(Extraction {
        sink,
        summary,
        dispatch,
    })
}

const ROOT_ELEMENT: &str = "osm";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Where the reader stands relative to the `<osm>` root element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Root {
    Pending,
    Open { depth: usize },
    Closed,
}

impl Root {
    fn start(&mut self, name: &[u8], self_closing: bool) -> Result<(), MalformedReason> {
        match *self {
            Self::Pending if name == ROOT_ELEMENT.as_bytes() => {
                *self = if self_closing {
                    Self::Closed
                } else {
                    Self::Open { depth: 1 }
                };
                Ok(())
            }
            Self::Pending => Err(MalformedReason::UnexpectedRoot {
                found: String::from_utf8_lossy(name).into_owned(),
            }),
            Self::Open { depth } => {
                if !self_closing {
                    *self = Self::Open {
                        depth: depth.saturating_add(1),
                    };
                }
                Ok(())
            }
            Self::Closed => Err(MalformedReason::ContentOutsideRoot),
        }
    }

    fn end(&mut self) {
        if let Self::Open { depth } = *self {
            *self = match depth {
                0 | 1 => Self::Closed,
                _ => Self::Open { depth: depth - 1 },
            };
        }
    }

    fn text(self, content: &[u8]) -> Result<(), MalformedReason> {
        let content = content.strip_prefix(UTF8_BOM).unwrap_or(content);
        if matches!(self, Self::Open { .. }) || content.iter().all(u8::is_ascii_whitespace) {
            Ok(())
        } else {
            Err(MalformedReason::ContentOutsideRoot)
        }
    }

    const fn finish(self) -> Result<(), MalformedReason> {
        match self {
            Self::Pending => Err(MalformedReason::MissingRoot),
            Self::Open { .. } => Err(MalformedReason::Unterminated {
                element: ROOT_ELEMENT,
            }),
            Self::Closed => Ok(()),
        }
    }
}

enum OpenElement {
    None,
    Node {
        id: i64,
        lon: f64,
        lat: f64,
        tags: Tags,
    },
    Way(Way),
    Relation(Relation),
}

impl OpenElement {
    const fn name(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Node { .. } => Some("node"),
            Self::Way(_) => Some("way"),
            Self::Relation(_) => Some("relation"),
        }
    }

    fn closes_with(&self, name: &[u8]) -> bool {
        self.name().is_some_and(|open| open.as_bytes() == name)
    }

    fn tags_mut(&mut self) -> Option<&mut Tags> {
        match self {
            Self::None => None,
            Self::Node { tags, .. } => Some(tags),
            Self::Way(way) => Some(&mut way.tags),
            Self::Relation(relation) => Some(&mut relation.tags),
        }
    }
}

struct Extractor<S> {
    dispatcher: BatchDispatcher<S>,
    summary: ExtractSummary,
    open: OpenElement,
}

impl<S: PrimitiveSink> Extractor<S> {
    fn open(
        &mut self,
        element: &BytesStart<'_>,
        position: usize,
        self_closing: bool,
    ) -> Result<(), ExtractError<S::Error>> {
        let malformed = |reason: MalformedReason| -> ExtractError<S::Error> {
            ExtractError::Malformed { position, reason }
        };
        match element.name().as_ref() {
            b"node" => {
                self.ensure_top("node").map_err(malformed)?;
                let [id, lat, lon] = read_attributes(element, "node", ["id", "lat", "lon"])
                    .map_err(malformed)?;
                self.open = OpenElement::Node {
                    id: required(id, "node", "id").map_err(malformed)?,
                    lat: required(lat, "node", "lat").map_err(malformed)?,
                    lon: required(lon, "node", "lon").map_err(malformed)?,
                    tags: Tags::new(),
                };
            }
            b"way" => {
                self.ensure_top("way").map_err(malformed)?;
                let [id] = read_attributes(element, "way", ["id"]).map_err(malformed)?;
                self.open = OpenElement::Way(Way {
                    id: required(id, "way", "id").map_err(malformed)?,
                    tags: Tags::new(),
                    refs: Vec::new(),
                });
            }
            b"relation" => {
                self.ensure_top("relation").map_err(malformed)?;
                let [id] = read_attributes(element, "relation", ["id"]).map_err(malformed)?;
                self.open = OpenElement::Relation(Relation {
                    id: required(id, "relation", "id").map_err(malformed)?,
                    tags: Tags::new(),
                    members: Vec::new(),
                });
            }
            b"tag" => {
                if let Some(tags) = self.open.tags_mut() {
                    let [key, value] =
                        read_attributes(element, "tag", ["k", "v"]).map_err(malformed)?;
                    tags.insert(
                        present(key, "tag", "k").map_err(malformed)?,
                        present(value, "tag", "v").map_err(malformed)?,
                    );
                }
                return Ok(());
            }
            b"nd" => {
                if let OpenElement::Way(way) = &mut self.open {
                    let [reference] = read_attributes(element, "nd", ["ref"]).map_err(malformed)?;
                    way.refs
                        .push(required(reference, "nd", "ref").map_err(malformed)?);
                }
                return Ok(());
            }
            b"member" => {
                if let OpenElement::Relation(relation) = &mut self.open {
                    let [member_type, reference, role] =
                        read_attributes(element, "member", ["type", "ref", "role"])
                            .map_err(malformed)?;
                    let member_type = present(member_type, "member", "type").map_err(malformed)?;
                    relation.members.push(Member {
                        reference: required(reference, "member", "ref").map_err(malformed)?,
                        member_type: member_type
                            .parse::<MemberType>()
                            .map_err(|err| malformed(err.into()))?,
                        role: role.unwrap_or_default(),
                    });
                }
                return Ok(());
            }
            _ => return Ok(()),
        }
        if self_closing {
            self.close()?;
        }
        Ok(())
    }

    fn ensure_top(&self, inner: &'static str) -> Result<(), MalformedReason> {
        match self.open.name() {
            Some(outer) => Err(MalformedReason::NestedPrimitive { outer, inner }),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> Result<(), ExtractError<S::Error>> {
        match std::mem::replace(&mut self.open, OpenElement::None) {
            OpenElement::None => {}
            OpenElement::Node { id, lon, lat, tags } => {
                let tagged = !tags.is_empty();
                self.summary.record_node(lon, lat, tagged);
                if tagged {
                    self.offer(Primitive::Node(TaggedNode { id, tags, lon, lat }))?;
                }
                self.offer(Primitive::Coordinate(Coordinate { id, lon, lat }))?;
            }
            OpenElement::Way(way) => {
                self.summary.ways += 1;
                self.offer(Primitive::Way(way))?;
            }
            OpenElement::Relation(relation) => {
                self.summary.relations += 1;
                self.offer(Primitive::Relation(relation))?;
            }
        }
        Ok(())
    }

    fn offer(&mut self, record: Primitive) -> Result<(), ExtractError<S::Error>> {
        self.dispatcher
            .offer(record)
            .map_err(|source| ExtractError::Sink { source })
    }
}

fn read_attributes<const N: usize>(
    element: &BytesStart<'_>,
    name: &'static str,
    keys: [&'static str; N],
) -> Result<[Option<String>; N], MalformedReason> {
    let mut found: [Option<String>; N] = std::array::from_fn(|_| None);
    for entry in element.attributes() {
        let attribute = entry.map_err(|err| MalformedReason::AttributeSyntax {
            element: name,
            detail: err.to_string(),
        })?;
        let Some(slot) = keys
            .iter()
            .position(|key| key.as_bytes() == attribute.key.as_ref())
            .and_then(|index| found.get_mut(index))
        else {
            continue;
        };
        let value = attribute
            .unescape_value()
            .map_err(|err| MalformedReason::AttributeSyntax {
                element: name,
                detail: err.to_string(),
            })?;
        *slot = Some(value.into_owned());
    }
    Ok(found)
}

fn present(
    value: Option<String>,
    element: &'static str,
    attribute: &'static str,
) -> Result<String, MalformedReason> {
    value.ok_or(MalformedReason::MissingAttribute { element, attribute })
}

fn required<T: FromStr>(
    value: Option<String>,
    element: &'static str,
    attribute: &'static str,
) -> Result<T, MalformedReason> {
    let raw = present(value, element, attribute)?;
    let parsed = raw.trim().parse::<T>();
    parsed.map_err(|_| MalformedReason::InvalidAttribute {
        element,
        attribute,
        value: raw,
    })
}
