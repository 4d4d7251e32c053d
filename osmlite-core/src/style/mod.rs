//! Style rules controlling tag projection and polygon classification.
//!
//! A style file uses the osm2pgsql layout: one rule per line, made of
//! whitespace-separated `osm-types tag-name data-type [flag]` tokens. A `#`
//! starts a comment that runs to the end of the line. Lines that cannot be
//! parsed are logged and skipped; they never abort the load.
//!
//! ```text
//! # osm-types   tag        data-type  flag
//! node,way      name       text
//! way           building   text       polygon
//! node,way      note       text       delete
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::io::{self, BufRead, BufReader};

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use thiserror::Error;

/// Behavioural flag attached to a style rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StyleFlag {
    /// Plain column.
    Normal,
    /// The tag marks closed ways as areas.
    Polygon,
    /// The tag marks closed ways as areas but gets no dedicated column.
    Phstore,
    /// The tag is dropped from the residual tag column.
    Delete,
    /// Any other token, kept verbatim and treated like [`StyleFlag::Normal`].
    Other(String),
}

impl StyleFlag {
    /// Interpret a flag token from a style file.
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        match token {
            "normal" => Self::Normal,
            "polygon" => Self::Polygon,
            "phstore" => Self::Phstore,
            "delete" => Self::Delete,
            other => Self::Other(other.to_owned()),
        }
    }

    /// The token as written in a style file.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Normal => "normal",
            Self::Polygon => "polygon",
            Self::Phstore => "phstore",
            Self::Delete => "delete",
            Self::Other(token) => token,
        }
    }
}

impl fmt::Display for StyleFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed style rule, keyed by its tag name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRule {
    /// Tag the rule applies to.
    pub tag_name: String,
    /// Primitive types listed in the first column (`node`, `way`, ...).
    pub osm_types: BTreeSet<String>,
    /// SQL type of the projected column.
    pub data_type: String,
    /// Optional behavioural flag.
    pub flag: Option<StyleFlag>,
}

impl StyleRule {
    fn has_flag(&self, wanted: &[StyleFlag]) -> bool {
        self.flag.as_ref().is_some_and(|flag| wanted.contains(flag))
    }

    /// Whether the tag gets a dedicated column in the output tables.
    #[must_use]
    pub fn is_field(&self) -> bool {
        !self.has_flag(&[StyleFlag::Phstore, StyleFlag::Delete])
    }

    /// Whether the tag turns a way into a polygon.
    #[must_use]
    pub fn is_polygon(&self) -> bool {
        self.has_flag(&[StyleFlag::Polygon, StyleFlag::Phstore])
    }

    /// Whether the tag is removed from the residual tag column.
    #[must_use]
    pub fn is_deleted_on_export(&self) -> bool {
        self.has_flag(&[StyleFlag::Delete])
    }
}

/// Reason a single style line was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StyleLineError {
    /// The line did not split into three or four tokens.
    #[error("expected 3 or 4 fields but found {found}")]
    FieldCount {
        /// Number of tokens found after comment stripping.
        found: usize,
    },
    /// The data type token is not safe to use as an SQL column type.
    #[error("data type {data_type:?} is not a plain SQL type name")]
    InvalidDataType {
        /// The offending token.
        data_type: String,
    },
}

/// Errors raised when a style file cannot be read at all.
#[derive(Debug, Error)]
pub enum StyleError {
    /// Opening the style file failed.
    #[error("failed to open style file at {path}")]
    Open {
        /// Requested style path.
        path: Utf8PathBuf,
        /// Source error from std I/O.
        #[source]
        source: io::Error,
    },
    /// Reading a line from the style file failed.
    #[error("failed to read line {line} of style file {path}")]
    Read {
        /// Style file path.
        path: Utf8PathBuf,
        /// One-based line number.
        line: usize,
        /// Source error from std I/O.
        #[source]
        source: io::Error,
    },
}

/// Parse one style line.
///
/// Returns `Ok(None)` for blank and comment-only lines.
///
/// # Errors
/// Returns [`StyleLineError`] when the line is not a valid rule.
pub fn parse_style_line(line: &str) -> Result<Option<StyleRule>, StyleLineError> {
    let content = line.split('#').next().unwrap_or_default().trim();
    if content.is_empty() {
        return Ok(None);
    }
    let tokens: Vec<&str> = content.split_whitespace().collect();
    let (osm_types, tag_name, data_type, flag) = match tokens.as_slice() {
        [types, tag, data_type] => (*types, *tag, *data_type, None),
        [types, tag, data_type, flag] => (*types, *tag, *data_type, Some(*flag)),
        other => return Err(StyleLineError::FieldCount { found: other.len() }),
    };
    if !data_type
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
    {
        return Err(StyleLineError::InvalidDataType {
            data_type: data_type.to_owned(),
        });
    }
    Ok(Some(StyleRule {
        tag_name: tag_name.to_owned(),
        osm_types: osm_types
            .split(',')
            .filter(|kind| !kind.is_empty())
            .map(str::to_owned)
            .collect(),
        data_type: data_type.to_owned(),
        flag: flag.map(StyleFlag::from_token),
    }))
}

/// Tag rules loaded from a style file.
///
/// The table is an ordinary value: load it once and pass it to whoever needs
/// it. When a tag is defined more than once, the last definition wins.
///
/// # Examples
/// ```
/// use osmlite_core::StyleTable;
///
/// let style = StyleTable::parse(
///     "node,way name text\n\
///      way building text polygon\n\
///      node,way note text delete # dropped from the tags column\n",
/// );
///
/// assert!(style.is_field("name"));
/// assert!(style.is_polygon_tag(["building", "name"]));
/// assert!(style.delete_on_export("note"));
/// assert!(!style.is_field("note"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleTable {
    rules: HashMap<String, StyleRule>,
    rejected_lines: usize,
}

impl StyleTable {
    /// Load rules from a style file on disk.
    ///
    /// # Errors
    /// Returns [`StyleError`] when the file cannot be opened or read. Lines
    /// that fail to parse are skipped and counted instead.
    pub fn load(path: &Utf8Path) -> Result<Self, StyleError> {
        let file = osmlite_fs::open_utf8_file(path).map_err(|source| StyleError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file), path)
    }

    /// Load rules from any buffered reader; `origin` names the source in errors.
    ///
    /// # Errors
    /// Returns [`StyleError::Read`] when reading a line fails.
    pub fn from_reader<R: BufRead>(reader: R, origin: &Utf8Path) -> Result<Self, StyleError> {
        let mut table = Self::default();
        for (index, line) in reader.lines().enumerate() {
            let line_number = index.saturating_add(1);
            let text = line.map_err(|source| StyleError::Read {
                path: origin.to_path_buf(),
                line: line_number,
                source,
            })?;
            table.absorb_line(line_number, &text);
        }
        Ok(table)
    }

    /// Parse rules from in-memory text.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut table = Self::default();
        for (index, line) in text.lines().enumerate() {
            table.absorb_line(index.saturating_add(1), line);
        }
        table
    }

    fn absorb_line(&mut self, line_number: usize, line: &str) {
        match parse_style_line(line) {
            Ok(Some(rule)) => self.insert(rule),
            Ok(None) => {}
            Err(err) => {
                warn!("skipping style line {line_number}: {err} ({line:?})");
                self.rejected_lines = self.rejected_lines.saturating_add(1);
            }
        }
    }

    /// Add a rule, replacing any earlier rule for the same tag.
    pub fn insert(&mut self, rule: StyleRule) {
        if let Some(previous) = self.rules.insert(rule.tag_name.clone(), rule) {
            debug!("style rule for {:?} overrides an earlier definition", previous.tag_name);
        }
    }

    /// Rule registered for `tag`.
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<&StyleRule> {
        self.rules.get(tag)
    }

    /// True iff `tag` is known and its flag is neither `phstore` nor `delete`.
    #[must_use]
    pub fn is_field(&self, tag: &str) -> bool {
        self.rules.get(tag).is_some_and(StyleRule::is_field)
    }

    /// True iff any of the given tags is flagged `polygon` or `phstore`.
    #[must_use]
    pub fn is_polygon_tag<I, S>(&self, tags: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tags.into_iter()
            .any(|tag| self.rules.get(tag.as_ref()).is_some_and(StyleRule::is_polygon))
    }

    /// True iff `tag` is flagged `delete`.
    #[must_use]
    pub fn delete_on_export(&self, tag: &str) -> bool {
        self.rules
            .get(tag)
            .is_some_and(StyleRule::is_deleted_on_export)
    }

    /// Iterate over `(tag_name, rule)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StyleRule)> {
        self.rules.iter().map(|(tag, rule)| (tag.as_str(), rule))
    }

    /// Rules that produce dedicated columns, sorted by tag name.
    #[must_use]
    pub fn field_rules(&self) -> Vec<&StyleRule> {
        let mut fields: Vec<&StyleRule> =
            self.rules.values().filter(|rule| rule.is_field()).collect();
        fields.sort_by(|left, right| left.tag_name.cmp(&right.tag_name));
        fields
    }

    /// Number of distinct tags with a rule.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Report whether no rules were loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Number of lines skipped because they failed to parse.
    #[must_use]
    pub const fn rejected_lines(&self) -> usize {
        self.rejected_lines
    }
}

#[cfg(test)]
mod tests;
