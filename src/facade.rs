//! The three `watch` entry points a caller opens a change stream from (spec §4.1).

use std::sync::Arc;

use bson::Document;
use serde::de::DeserializeOwned;

use crate::{
    change_stream::{
        command::AggregateTarget, event::ChangeStreamEvent, options::ChangeStreamOptions,
        session::SessionChangeStream, ChangeStream,
    },
    coll::Namespace,
    cursor::CommandTransport,
    error::Result,
    session::ClientSession,
};

/// A handle to a deployment, the entry point for `watch`ing every database in it.
#[derive(Debug, Clone)]
pub struct Client<Tr> {
    transport: Arc<Tr>,
}

impl<Tr: CommandTransport> Client<Tr> {
    /// Wrap a transport collaborator into a client handle.
    pub fn new(transport: Tr) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    /// A handle to the named database.
    pub fn database(&self, name: impl Into<String>) -> Database<Tr> {
        Database {
            transport: Arc::clone(&self.transport),
            name: name.into(),
        }
    }

    /// A handle to a collection in the named database.
    pub fn collection(&self, db: impl Into<String>, coll: impl Into<String>) -> Collection<Tr> {
        Collection {
            transport: Arc::clone(&self.transport),
            ns: Namespace::new(db, coll),
        }
    }

    /// Open a change stream over every change in the deployment (spec §4.1's deployment-scoped
    /// `watch`). Sets `allChangesForCluster` on the underlying `$changeStream` stage.
    pub async fn watch<T: DeserializeOwned>(
        &self,
        pipeline: impl IntoIterator<Item = Document>,
        options: impl Into<Option<ChangeStreamOptions>>,
    ) -> Result<ChangeStream<Tr, T>> {
        let mut options = options.into().unwrap_or_default();
        options.all_changes_for_cluster = Some(true);
        ChangeStream::open(
            Arc::clone(&self.transport),
            AggregateTarget::Cluster,
            pipeline.into_iter().collect(),
            options,
        )
        .await
    }
}

/// A handle to a database, the entry point for `watch`ing every collection in it.
#[derive(Clone)]
pub struct Database<Tr> {
    transport: Arc<Tr>,
    name: String,
}

impl<Tr: CommandTransport> Database<Tr> {
    /// A handle to a collection in this database.
    pub fn collection(&self, coll: impl Into<String>) -> Collection<Tr> {
        Collection {
            transport: Arc::clone(&self.transport),
            ns: Namespace::new(self.name.clone(), coll),
        }
    }

    /// Open a change stream over every collection in this database (spec §4.1's
    /// database-scoped `watch`).
    pub async fn watch<T: DeserializeOwned>(
        &self,
        pipeline: impl IntoIterator<Item = Document>,
        options: impl Into<Option<ChangeStreamOptions>>,
    ) -> Result<ChangeStream<Tr, T>> {
        ChangeStream::open(
            Arc::clone(&self.transport),
            AggregateTarget::Database(self.name.clone()),
            pipeline.into_iter().collect(),
            options.into().unwrap_or_default(),
        )
        .await
    }
}

/// A handle to a single collection, the entry point for `watch`ing just that collection
/// (spec §4.1's collection-scoped `watch`).
#[derive(Clone)]
pub struct Collection<Tr> {
    transport: Arc<Tr>,
    ns: Namespace,
}

impl<Tr: CommandTransport> Collection<Tr> {
    /// This collection's canonical namespace.
    pub fn namespace(&self) -> &Namespace {
        &self.ns
    }

    /// Open a change stream over this collection. `T` defaults to
    /// [`ChangeStreamEvent<Document>`](ChangeStreamEvent); pass any `DeserializeOwned` type to
    /// deserialize events (or their `fullDocument`) directly into it.
    pub async fn watch<T: DeserializeOwned>(
        &self,
        pipeline: impl IntoIterator<Item = Document>,
        options: impl Into<Option<ChangeStreamOptions>>,
    ) -> Result<ChangeStream<Tr, T>> {
        ChangeStream::open(
            Arc::clone(&self.transport),
            AggregateTarget::Collection(self.ns.clone()),
            pipeline.into_iter().collect(),
            options.into().unwrap_or_default(),
        )
        .await
    }

    /// As [`Self::watch`], but bound to a [`ClientSession`] for the life of the stream.
    pub async fn watch_with_session<T: DeserializeOwned>(
        &self,
        pipeline: impl IntoIterator<Item = Document>,
        options: impl Into<Option<ChangeStreamOptions>>,
        _session: &mut ClientSession,
    ) -> Result<SessionChangeStream<Tr, T>> {
        self.watch(pipeline, options)
            .await
            .map(SessionChangeStream::new)
    }
}

/// Convenience alias for the common case of watching with events decoded as plain [`Document`]s.
pub type DefaultChangeStream<Tr> = ChangeStream<Tr, ChangeStreamEvent<Document>>;
