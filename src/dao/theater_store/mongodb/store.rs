use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, ClientSession, Collection, Database, IndexModel,
    bson::{Bson, Document, doc},
    error::{Error as MongoError, TRANSIENT_TRANSACTION_ERROR},
    options::{IndexOptions, ReturnDocument},
};
use serde::Deserialize;
use time::{Date, Duration, OffsetDateTime};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult, is_duplicate_key},
    filters::{
        credit_claim_filter, credit_claim_update, creditable_filter, search_pipeline,
        transition_filter, transition_update, view_increment,
    },
    models::{
        CONTENT_COLLECTION, DAY_COLLECTION, MongoContentDocument, MongoDayDocument,
        MongoScreeningDocument, MongoSessionDocument, MongoSubscriptionDocument,
        SCREENING_COLLECTION, SESSION_COLLECTION, SUBSCRIPTION_COLLECTION, doc_id, format_date,
        from_bson_uuid, to_bson_datetime, to_bson_uuid,
    },
};
use crate::{
    dao::{
        models::{
            ContentEntity, CreditOutcome, ScreeningDayEntity, ScreeningEntity, ScreeningPage,
            ScreeningSearch, WatchSessionEntity,
        },
        storage::{StorageError, StorageResult},
        theater_store::TheaterStore,
    },
    state::lifecycle::{LifecycleWindows, TransitionEdge},
};

/// Theater store persisted in MongoDB.
#[derive(Clone)]
pub struct MongoTheaterStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

/// Attempts of one credit transaction before a write conflict is reported.
const CREDIT_ATTEMPTS: u32 = 3;

/// Outcome of the transactional part of a credit.
enum Claim {
    Claimed,
    NotClaimable,
    ContentMissing(Uuid),
}

/// One `$facet` result of the search pipeline.
#[derive(Debug, Deserialize)]
struct SearchFacet {
    #[serde(default)]
    items: Vec<MongoScreeningDocument>,
    #[serde(default)]
    total: Vec<SearchCount>,
}

#[derive(Debug, Deserialize)]
struct SearchCount {
    count: i64,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoTheaterStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;
        let indexes: [(&'static str, &'static str, Document, bool); 5] = [
            (
                DAY_COLLECTION,
                "content_date_idx",
                doc! { "content_id": 1, "date": 1 },
                true,
            ),
            (
                SESSION_COLLECTION,
                "viewer_screening_idx",
                doc! { "viewer_id": 1, "screening_id": 1 },
                true,
            ),
            (
                SESSION_COLLECTION,
                "credit_sweep_idx",
                doc! { "view_counted": 1, "left_at": 1 },
                false,
            ),
            (
                SCREENING_COLLECTION,
                "status_idx",
                doc! { "status": 1 },
                false,
            ),
            (
                SCREENING_COLLECTION,
                "owner_window_idx",
                doc! { "owner_id": 1, "start_at": 1 },
                false,
            ),
        ];

        for (collection, name, keys, unique) in indexes {
            let model = IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .name(Some(name.to_owned()))
                        .unique(Some(unique))
                        .build(),
                )
                .build();
            database
                .collection::<Document>(collection)
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index: name,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn client(&self) -> Client {
        let guard = self.inner.state.read().await;
        guard.client.clone()
    }

    async fn contents(&self) -> Collection<MongoContentDocument> {
        self.database().await.collection(CONTENT_COLLECTION)
    }

    async fn subscriptions(&self) -> Collection<MongoSubscriptionDocument> {
        self.database().await.collection(SUBSCRIPTION_COLLECTION)
    }

    async fn days(&self) -> Collection<MongoDayDocument> {
        self.database().await.collection(DAY_COLLECTION)
    }

    async fn screenings(&self) -> Collection<MongoScreeningDocument> {
        self.database().await.collection(SCREENING_COLLECTION)
    }

    async fn sessions(&self) -> Collection<MongoSessionDocument> {
        self.database().await.collection(SESSION_COLLECTION)
    }

    async fn find_screening(&self, id: Uuid) -> StorageResult<Option<ScreeningEntity>> {
        self.screenings()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadScreening { id, source })?
            .map(ScreeningEntity::try_from)
            .transpose()
    }

    async fn list_screenings_for_day(&self, day_id: Uuid) -> StorageResult<Vec<ScreeningEntity>> {
        let documents: Vec<MongoScreeningDocument> = self
            .screenings()
            .await
            .find(doc! { "day_id": to_bson_uuid(day_id) })
            .sort(doc! { "start_at": 1 })
            .await
            .map_err(|source| MongoDaoError::ListDayScreenings { day_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListDayScreenings { day_id, source })?;

        documents.into_iter().map(ScreeningEntity::try_from).collect()
    }

    async fn insert_screening(&self, screening: ScreeningEntity) -> MongoResult<()> {
        let id = screening.id;
        let document = MongoScreeningDocument::from(screening);
        self.screenings()
            .await
            .insert_one(document)
            .await
            .map_err(|source| MongoDaoError::SaveScreening { id, source })?;
        Ok(())
    }

    async fn reschedule_screening(
        &self,
        id: Uuid,
        start_at: OffsetDateTime,
        end_at: OffsetDateTime,
    ) -> StorageResult<Option<ScreeningEntity>> {
        self.screenings()
            .await
            .find_one_and_update(
                doc_id(id),
                doc! { "$set": {
                    "start_at": to_bson_datetime(start_at),
                    "end_at": to_bson_datetime(end_at),
                } },
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::SaveScreening { id, source })?
            .map(ScreeningEntity::try_from)
            .transpose()
    }

    async fn delete_screening(&self, id: Uuid) -> MongoResult<bool> {
        let result = self
            .screenings()
            .await
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::DeleteScreening { id, source })?;
        Ok(result.deleted_count > 0)
    }

    async fn owner_has_overlap(
        &self,
        owner_id: Uuid,
        start_at: OffsetDateTime,
        end_at: OffsetDateTime,
        exclude: Option<Uuid>,
    ) -> MongoResult<bool> {
        let mut filter = doc! {
            "owner_id": to_bson_uuid(owner_id),
            "start_at": { "$lt": to_bson_datetime(end_at) },
            "end_at": { "$gt": to_bson_datetime(start_at) },
        };
        if let Some(exclude) = exclude {
            filter.insert("_id", doc! { "$ne": to_bson_uuid(exclude) });
        }

        let found = self
            .screenings()
            .await
            .find_one(filter)
            .await
            .map_err(|source| MongoDaoError::QueryOwnerScreenings { owner_id, source })?;
        Ok(found.is_some())
    }

    async fn find_screening_day(&self, id: Uuid) -> StorageResult<Option<ScreeningDayEntity>> {
        self.days()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadScreeningDayById { id, source })?
            .map(ScreeningDayEntity::try_from)
            .transpose()
    }

    async fn find_screening_day_by_date(
        &self,
        content_id: Uuid,
        date: Date,
    ) -> StorageResult<Option<ScreeningDayEntity>> {
        self.days()
            .await
            .find_one(day_filter(content_id, date))
            .await
            .map_err(|source| MongoDaoError::LoadScreeningDay { content_id, source })?
            .map(ScreeningDayEntity::try_from)
            .transpose()
    }

    async fn ensure_screening_day(
        &self,
        content_id: Uuid,
        date: Date,
    ) -> StorageResult<ScreeningDayEntity> {
        let days = self.days().await;
        let upsert = days
            .find_one_and_update(
                day_filter(content_id, date),
                doc! { "$setOnInsert": {
                    "_id": to_bson_uuid(Uuid::new_v4()),
                    "locked": false,
                    "locked_at": Bson::Null,
                } },
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await;

        let document = match upsert {
            Ok(document) => document,
            // Lost the insert race on the unique index; the winner's row is there now.
            Err(err) if is_duplicate_key(&err) => days
                .find_one(day_filter(content_id, date))
                .await
                .map_err(|source| MongoDaoError::LoadScreeningDay { content_id, source })?,
            Err(source) => {
                return Err(MongoDaoError::LoadScreeningDay { content_id, source }.into());
            }
        };

        document
            .ok_or_else(|| {
                StorageError::corrupt(DAY_COLLECTION, format!("upserted day of `{content_id}` missing"))
            })
            .and_then(ScreeningDayEntity::try_from)
    }

    async fn set_day_lock(
        &self,
        id: Uuid,
        locked_at: Option<OffsetDateTime>,
    ) -> StorageResult<Option<ScreeningDayEntity>> {
        let locked_at = locked_at.map_or(Bson::Null, |at| Bson::DateTime(to_bson_datetime(at)));
        let locked = !matches!(locked_at, Bson::Null);
        self.days()
            .await
            .find_one_and_update(
                doc! { "_id": to_bson_uuid(id), "locked": false },
                doc! { "$set": { "locked": locked, "locked_at": locked_at } },
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::SaveScreeningDay { id, source })?
            .map(ScreeningDayEntity::try_from)
            .transpose()
    }

    /// Moves one eligible screening per round trip until none is left, so each move is its
    /// own conditional update.
    async fn apply_transition(
        &self,
        edge: TransitionEdge,
        now: OffsetDateTime,
        windows: LifecycleWindows,
    ) -> MongoResult<Vec<Uuid>> {
        let filter = transition_filter(edge, now, windows);
        let update = transition_update(edge);

        let screenings = self.screenings().await;
        let mut moved = Vec::new();
        loop {
            let document = screenings
                .find_one_and_update(filter.clone(), update.clone())
                .await
                .map_err(|source| MongoDaoError::ApplyTransition {
                    transition: edge.to_string(),
                    source,
                })?;
            match document {
                Some(document) => moved.push(from_bson_uuid(document.id)),
                None => break,
            }
        }
        Ok(moved)
    }

    async fn find_content(&self, id: Uuid) -> MongoResult<Option<ContentEntity>> {
        let document = self
            .contents()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadContent { id, source })?;
        Ok(document.map(ContentEntity::from))
    }

    async fn subscription_is_active(&self, viewer_id: Uuid) -> MongoResult<bool> {
        let document = self
            .subscriptions()
            .await
            .find_one(doc_id(viewer_id))
            .await
            .map_err(|source| MongoDaoError::LoadSubscription { viewer_id, source })?;
        Ok(document.is_some_and(|subscription| subscription.active))
    }

    async fn open_session(
        &self,
        viewer_id: Uuid,
        screening_id: Uuid,
        content_id: Uuid,
        now: OffsetDateTime,
    ) -> StorageResult<WatchSessionEntity> {
        let sessions = self.sessions().await;
        let filter = session_filter(viewer_id, screening_id);
        let update = doc! {
            "$set": { "entered_at": to_bson_datetime(now), "left_at": Bson::Null },
            "$setOnInsert": {
                "_id": to_bson_uuid(Uuid::new_v4()),
                "content_id": to_bson_uuid(content_id),
                "view_counted": false,
            },
        };

        let mut attempt = sessions
            .find_one_and_update(filter.clone(), update.clone())
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await;
        if matches!(&attempt, Err(err) if is_duplicate_key(err)) {
            // A concurrent enter inserted the row first; update it instead.
            attempt = sessions
                .find_one_and_update(filter, update)
                .upsert(true)
                .return_document(ReturnDocument::After)
                .await;
        }

        attempt
            .map_err(|source| MongoDaoError::SaveSession {
                viewer_id,
                screening_id,
                source,
            })?
            .ok_or_else(|| {
                StorageError::corrupt(SESSION_COLLECTION, "upserted session missing")
            })
            .and_then(WatchSessionEntity::try_from)
    }

    async fn close_session(
        &self,
        viewer_id: Uuid,
        screening_id: Uuid,
        now: OffsetDateTime,
    ) -> StorageResult<Option<WatchSessionEntity>> {
        let mut filter = session_filter(viewer_id, screening_id);
        filter.insert("left_at", Bson::Null);
        self.sessions()
            .await
            .find_one_and_update(filter, doc! { "$set": { "left_at": to_bson_datetime(now) } })
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::SaveSession {
                viewer_id,
                screening_id,
                source,
            })?
            .map(WatchSessionEntity::try_from)
            .transpose()
    }

    /// Claims the session and bumps the content counters inside one transaction, so the
    /// flag and the increment are committed together or not at all.
    ///
    /// A racing credit of the same session surfaces as a transient write conflict; the
    /// transaction is then retried and finds the session already claimed.
    async fn credit_session(&self, id: Uuid) -> StorageResult<CreditOutcome> {
        let step = |what: &'static str| {
            move |source: MongoError| MongoDaoError::CreditTransaction {
                id,
                step: what,
                source,
            }
        };
        let client = self.client().await;

        let mut attempt = 1;
        loop {
            let mut txn = client
                .start_session()
                .await
                .map_err(step("start a session"))?;
            txn.start_transaction()
                .await
                .map_err(step("start a transaction"))?;

            let claim = match self.claim_and_count(&mut txn, id).await {
                Ok(claim) => claim,
                Err(source) => {
                    abort_quietly(&mut txn, id).await;
                    if is_transient(&source) && attempt < CREDIT_ATTEMPTS {
                        attempt += 1;
                        continue;
                    }
                    return Err(MongoDaoError::CreditSession { id, source }.into());
                }
            };

            match claim {
                Claim::Claimed => match txn.commit_transaction().await {
                    Ok(()) => return Ok(CreditOutcome::Credited),
                    Err(source) if is_transient(&source) && attempt < CREDIT_ATTEMPTS => {
                        attempt += 1;
                    }
                    Err(source) => return Err(step("commit")(source).into()),
                },
                Claim::NotClaimable => {
                    abort_quietly(&mut txn, id).await;
                    return self.credit_refusal(id).await;
                }
                Claim::ContentMissing(content_id) => {
                    abort_quietly(&mut txn, id).await;
                    return Err(StorageError::corrupt(
                        CONTENT_COLLECTION,
                        format!("content `{content_id}` missing while crediting"),
                    ));
                }
            }
        }
    }

    /// Transactional body of [`Self::credit_session`].
    async fn claim_and_count(&self, txn: &mut ClientSession, id: Uuid) -> Result<Claim, MongoError> {
        let claimed = self
            .sessions()
            .await
            .find_one_and_update(credit_claim_filter(id), credit_claim_update())
            .session(&mut *txn)
            .await?;
        let Some(session) = claimed else {
            return Ok(Claim::NotClaimable);
        };

        let content_id = from_bson_uuid(session.content_id);
        let result = self
            .contents()
            .await
            .update_one(doc_id(content_id), view_increment())
            .session(&mut *txn)
            .await?;
        if result.matched_count == 0 {
            return Ok(Claim::ContentMissing(content_id));
        }
        Ok(Claim::Claimed)
    }

    /// Why a session could not be claimed, read outside any transaction.
    async fn credit_refusal(&self, id: Uuid) -> StorageResult<CreditOutcome> {
        let current = self
            .sessions()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::CreditSession { id, source })?;
        Ok(match current {
            Some(session) if session.view_counted => CreditOutcome::AlreadyCredited,
            _ => CreditOutcome::NotEligible,
        })
    }

    async fn find_creditable_sessions(
        &self,
        left_before: OffsetDateTime,
        min_watch: Duration,
    ) -> StorageResult<Vec<WatchSessionEntity>> {
        self.query_sessions(creditable_filter(left_before, min_watch), doc! { "left_at": 1 })
            .await
    }

    async fn search_screenings(&self, search: ScreeningSearch) -> StorageResult<ScreeningPage> {
        let facet = self
            .screenings()
            .await
            .aggregate(search_pipeline(&search))
            .with_type::<SearchFacet>()
            .await
            .map_err(|source| MongoDaoError::SearchScreenings { source })?
            .try_next()
            .await
            .map_err(|source| MongoDaoError::SearchScreenings { source })?;
        let Some(facet) = facet else {
            return Ok(ScreeningPage::default());
        };

        let total = facet
            .total
            .first()
            .map_or(0, |count| count.count.max(0) as u64);
        let items = facet
            .items
            .into_iter()
            .map(ScreeningEntity::try_from)
            .collect::<StorageResult<Vec<_>>>()?;
        Ok(ScreeningPage { items, total })
    }

    async fn count_active_sessions(&self, screening_id: Uuid) -> MongoResult<u64> {
        self.sessions()
            .await
            .count_documents(doc! { "screening_id": to_bson_uuid(screening_id), "left_at": Bson::Null })
            .await
            .map_err(|source| MongoDaoError::QuerySessions { source })
    }

    async fn query_sessions(
        &self,
        filter: Document,
        sort: Document,
    ) -> StorageResult<Vec<WatchSessionEntity>> {
        let documents: Vec<MongoSessionDocument> = self
            .sessions()
            .await
            .find(filter)
            .sort(sort)
            .await
            .map_err(|source| MongoDaoError::QuerySessions { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::QuerySessions { source })?;

        documents
            .into_iter()
            .map(WatchSessionEntity::try_from)
            .collect()
    }
}

fn is_transient(err: &MongoError) -> bool {
    err.contains_label(TRANSIENT_TRANSACTION_ERROR)
}

async fn abort_quietly(txn: &mut ClientSession, session_id: Uuid) {
    if let Err(err) = txn.abort_transaction().await {
        warn!(session_id = %session_id, error = %err, "failed to abort credit transaction");
    }
}

fn day_filter(content_id: Uuid, date: Date) -> Document {
    doc! { "content_id": to_bson_uuid(content_id), "date": format_date(date) }
}

fn session_filter(viewer_id: Uuid, screening_id: Uuid) -> Document {
    doc! {
        "viewer_id": to_bson_uuid(viewer_id),
        "screening_id": to_bson_uuid(screening_id),
    }
}

impl TheaterStore for MongoTheaterStore {
    fn find_screening(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ScreeningEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_screening(id).await })
    }

    fn list_screenings_for_day(
        &self,
        day_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ScreeningEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_screenings_for_day(day_id).await })
    }

    fn insert_screening(&self, screening: ScreeningEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_screening(screening).await.map_err(Into::into) })
    }

    fn reschedule_screening(
        &self,
        id: Uuid,
        start_at: OffsetDateTime,
        end_at: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<Option<ScreeningEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.reschedule_screening(id, start_at, end_at).await })
    }

    fn delete_screening(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_screening(id).await.map_err(Into::into) })
    }

    fn owner_has_overlap(
        &self,
        owner_id: Uuid,
        start_at: OffsetDateTime,
        end_at: OffsetDateTime,
        exclude: Option<Uuid>,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .owner_has_overlap(owner_id, start_at, end_at, exclude)
                .await
                .map_err(Into::into)
        })
    }

    fn find_screening_day(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ScreeningDayEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_screening_day(id).await })
    }

    fn find_screening_day_by_date(
        &self,
        content_id: Uuid,
        date: Date,
    ) -> BoxFuture<'static, StorageResult<Option<ScreeningDayEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_screening_day_by_date(content_id, date).await })
    }

    fn ensure_screening_day(
        &self,
        content_id: Uuid,
        date: Date,
    ) -> BoxFuture<'static, StorageResult<ScreeningDayEntity>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_screening_day(content_id, date).await })
    }

    fn set_day_lock(
        &self,
        id: Uuid,
        locked_at: Option<OffsetDateTime>,
    ) -> BoxFuture<'static, StorageResult<Option<ScreeningDayEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.set_day_lock(id, locked_at).await })
    }

    fn apply_transition(
        &self,
        edge: TransitionEdge,
        now: OffsetDateTime,
        windows: LifecycleWindows,
    ) -> BoxFuture<'static, StorageResult<Vec<Uuid>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .apply_transition(edge, now, windows)
                .await
                .map_err(Into::into)
        })
    }

    fn find_content(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ContentEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_content(id).await.map_err(Into::into) })
    }

    fn subscription_is_active(&self, viewer_id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .subscription_is_active(viewer_id)
                .await
                .map_err(Into::into)
        })
    }

    fn open_session(
        &self,
        viewer_id: Uuid,
        screening_id: Uuid,
        content_id: Uuid,
        now: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<WatchSessionEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .open_session(viewer_id, screening_id, content_id, now)
                .await
        })
    }

    fn close_session(
        &self,
        viewer_id: Uuid,
        screening_id: Uuid,
        now: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<Option<WatchSessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.close_session(viewer_id, screening_id, now).await })
    }

    fn credit_session(&self, session_id: Uuid) -> BoxFuture<'static, StorageResult<CreditOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.credit_session(session_id).await })
    }

    fn find_creditable_sessions(
        &self,
        left_before: OffsetDateTime,
        min_watch: Duration,
    ) -> BoxFuture<'static, StorageResult<Vec<WatchSessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_creditable_sessions(left_before, min_watch).await })
    }

    fn search_screenings(
        &self,
        search: ScreeningSearch,
    ) -> BoxFuture<'static, StorageResult<ScreeningPage>> {
        let store = self.clone();
        Box::pin(async move { store.search_screenings(search).await })
    }

    fn count_active_sessions(&self, screening_id: Uuid) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .count_active_sessions(screening_id)
                .await
                .map_err(Into::into)
        })
    }

    fn list_sessions_for_viewer(
        &self,
        viewer_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<WatchSessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .query_sessions(
                    doc! { "viewer_id": to_bson_uuid(viewer_id) },
                    doc! { "entered_at": -1 },
                )
                .await
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
