#![forbid(unsafe_code)]

use log::debug;
use osmlite_core::{Coordinate, PrimitiveSink, Relation, TaggedNode, Tags, Way};
use rusqlite::{Connection, Error as SqliteError, ErrorCode, Transaction};
use thiserror::Error;

use super::{TableNames, quote_identifier};

/// Errors raised while persisting raw batches.
#[derive(Debug, Error)]
pub enum RawStoreError {
    /// A primary key or check constraint rejected a record, typically a
    /// duplicate id within one primitive type.
    #[error("record {id} violates a constraint of {table}")]
    ConstraintViolation {
        /// Table being written.
        table: String,
        /// Primitive id of the rejected record.
        id: i64,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Any other SQLite failure.
    #[error("failed to {operation} on {table}")]
    Sqlite {
        /// Operation in progress.
        operation: &'static str,
        /// Table being written.
        table: String,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Serializing tags to JSON failed.
    #[error("failed to serialize tags of record {id} for {table}")]
    SerializeTags {
        /// Table being written.
        table: String,
        /// Primitive id.
        id: i64,
        /// Source error produced by `serde_json`.
        #[source]
        source: serde_json::Error,
    },
}

fn insert_error(table: &str, id: i64, source: SqliteError) -> RawStoreError {
    if source.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
        RawStoreError::ConstraintViolation {
            table: table.to_owned(),
            id,
            source,
        }
    } else {
        RawStoreError::Sqlite {
            operation: "insert record",
            table: table.to_owned(),
            source,
        }
    }
}

fn tags_json(table: &str, id: i64, tags: &Tags) -> Result<String, RawStoreError> {
    serde_json::to_string(tags).map_err(|source| RawStoreError::SerializeTags {
        table: table.to_owned(),
        id,
        source,
    })
}

fn sqlite_error(operation: &'static str, table: &str) -> impl FnOnce(SqliteError) -> RawStoreError {
    let table = table.to_owned();
    move |source| RawStoreError::Sqlite {
        operation,
        table,
        source,
    }
}

fn in_transaction<F>(connection: &mut Connection, table: &str, work: F) -> Result<(), RawStoreError>
where
    F: FnOnce(&Transaction<'_>) -> Result<(), RawStoreError>,
{
    let transaction = connection
        .transaction()
        .map_err(sqlite_error("begin batch transaction", table))?;
    work(&transaction)?;
    transaction
        .commit()
        .map_err(sqlite_error("commit batch transaction", table))
}

/// Sink that writes extracted batches into the raw staging tables.
///
/// Each non-empty batch is written in its own transaction. Tags are stored
/// as JSON objects in document order.
#[derive(Debug)]
pub struct RawTableWriter<'c> {
    connection: &'c mut Connection,
    names: TableNames,
}

impl<'c> RawTableWriter<'c> {
    /// Write into the tables named by `names`, which must already exist.
    pub fn new(connection: &'c mut Connection, names: TableNames) -> Self {
        Self { connection, names }
    }

    /// Table names in use.
    #[must_use]
    pub fn names(&self) -> &TableNames {
        &self.names
    }
}

impl PrimitiveSink for RawTableWriter<'_> {
    type Error = RawStoreError;

    fn nodes(&mut self, batch: Vec<TaggedNode>) -> Result<(), RawStoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let table = self.names.nodes();
        in_transaction(self.connection, &table, |transaction| {
            let mut insert = transaction
                .prepare_cached(&format!(
                    "INSERT INTO {} (id, tags) VALUES (?1, ?2)",
                    quote_identifier(&table)
                ))
                .map_err(sqlite_error("prepare insert", &table))?;
            for node in &batch {
                let tags = tags_json(&table, node.id, &node.tags)?;
                insert
                    .execute((node.id, tags))
                    .map_err(|source| insert_error(&table, node.id, source))?;
            }
            Ok(())
        })?;
        debug!("committed {} rows to {table}", batch.len());
        Ok(())
    }

    fn coordinates(&mut self, batch: Vec<Coordinate>) -> Result<(), RawStoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let table = self.names.coords();
        in_transaction(self.connection, &table, |transaction| {
            let mut insert = transaction
                .prepare_cached(&format!(
                    "INSERT INTO {} (id, lat, lon) VALUES (?1, ?2, ?3)",
                    quote_identifier(&table)
                ))
                .map_err(sqlite_error("prepare insert", &table))?;
            for coordinate in &batch {
                insert
                    .execute((coordinate.id, coordinate.lat, coordinate.lon))
                    .map_err(|source| insert_error(&table, coordinate.id, source))?;
            }
            Ok(())
        })?;
        debug!("committed {} rows to {table}", batch.len());
        Ok(())
    }

    fn ways(&mut self, batch: Vec<Way>) -> Result<(), RawStoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let table = self.names.ways();
        let links = self.names.ways_coords();
        in_transaction(self.connection, &table, |transaction| {
            let mut insert_way = transaction
                .prepare_cached(&format!(
                    "INSERT INTO {} (id, tags) VALUES (?1, ?2)",
                    quote_identifier(&table)
                ))
                .map_err(sqlite_error("prepare insert", &table))?;
            let mut insert_link = transaction
                .prepare_cached(&format!(
                    "INSERT INTO {} (id_way, id_node, seq) VALUES (?1, ?2, ?3)",
                    quote_identifier(&links)
                ))
                .map_err(sqlite_error("prepare insert", &links))?;
            for way in &batch {
                let tags = tags_json(&table, way.id, &way.tags)?;
                insert_way
                    .execute((way.id, tags))
                    .map_err(|source| insert_error(&table, way.id, source))?;
                for (seq, node) in (0_i64..).zip(&way.refs) {
                    insert_link
                        .execute((way.id, node, seq))
                        .map_err(|source| insert_error(&links, way.id, source))?;
                }
            }
            Ok(())
        })?;
        debug!("committed {} rows to {table}", batch.len());
        Ok(())
    }

    fn relations(&mut self, batch: Vec<Relation>) -> Result<(), RawStoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let table = self.names.relations();
        let members = self.names.relations_refs();
        in_transaction(self.connection, &table, |transaction| {
            let mut insert_relation = transaction
                .prepare_cached(&format!(
                    "INSERT INTO {} (id, tags) VALUES (?1, ?2)",
                    quote_identifier(&table)
                ))
                .map_err(sqlite_error("prepare insert", &table))?;
            let mut insert_member = transaction
                .prepare_cached(&format!(
                    "INSERT INTO {} (id_relation, id_elt, type_elt, role, seq)
                        VALUES (?1, ?2, ?3, ?4, ?5)",
                    quote_identifier(&members)
                ))
                .map_err(sqlite_error("prepare insert", &members))?;
            for relation in &batch {
                let tags = tags_json(&table, relation.id, &relation.tags)?;
                insert_relation
                    .execute((relation.id, tags))
                    .map_err(|source| insert_error(&table, relation.id, source))?;
                for (seq, member) in (0_i64..).zip(&relation.members) {
                    insert_member
                        .execute((
                            relation.id,
                            member.reference,
                            member.member_type.as_str(),
                            member.role.as_str(),
                            seq,
                        ))
                        .map_err(|source| insert_error(&members, relation.id, source))?;
                }
            }
            Ok(())
        })?;
        debug!("committed {} rows to {table}", batch.len());
        Ok(())
    }
}
