//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use turnos_core::controller::RecordController;
use turnos_core::store::{Document, DocumentStore, Fields, OrderBy, StoreError, StoreResult};
use turnos_core::{ConfirmPrompt, FormPolicy, LocalAuthProvider, Patient, PatientField, SqliteStore};

pub const EMAIL: &str = "recepcion@clinica.com";
pub const PASSWORD: &str = "secreto1";

/// SQLite store that records calls, can be switched to fail, and can hold
/// the next create or read until released.
pub struct RecordingStore {
    pub inner: SqliteStore,
    pub creates: AtomicUsize,
    pub updates: AtomicUsize,
    pub queries: AtomicUsize,
    pub reads: AtomicUsize,
    pub deleted: Mutex<Vec<String>>,
    failing: AtomicBool,
    hold_create: AtomicBool,
    hold_read: AtomicBool,
    entered: Notify,
    released: Notify,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteStore::open_in_memory().unwrap(),
            creates: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
            deleted: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            hold_create: AtomicBool::new(false),
            hold_read: AtomicBool::new(false),
            entered: Notify::new(),
            released: Notify::new(),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn writes(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
            + self.updates.load(Ordering::SeqCst)
            + self.deleted.lock().unwrap().len()
    }

    /// Park the next `create_record` until [`release`](Self::release).
    pub fn hold_next_create(&self) {
        self.hold_create.store(true, Ordering::SeqCst);
    }

    /// Park the next `get_all_records` until [`release`](Self::release).
    pub fn hold_next_read(&self) {
        self.hold_read.store(true, Ordering::SeqCst);
    }

    /// Wait until a held call has reached the store.
    pub async fn wait_held(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.released.notify_one();
    }

    async fn pause_if(&self, flag: &AtomicBool) {
        if flag.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.released.notified().await;
        }
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("connection reset".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for RecordingStore {
    async fn create_record(&self, collection: &str, fields: Fields) -> StoreResult<String> {
        self.pause_if(&self.hold_create).await;
        self.check()?;
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create_record(collection, fields).await
    }

    async fn get_all_records(
        &self,
        collection: &str,
        order_by: Option<OrderBy>,
    ) -> StoreResult<Vec<Document>> {
        self.pause_if(&self.hold_read).await;
        self.check()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_all_records(collection, order_by).await
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> StoreResult<Vec<Document>> {
        self.check()?;
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.query_by_field(collection, field, value).await
    }

    async fn update_record(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        self.check()?;
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_record(collection, id, fields).await
    }

    async fn delete_record(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.check()?;
        self.deleted.lock().unwrap().push(id.to_string());
        self.inner.delete_record(collection, id).await
    }
}

/// Prompt with a fixed answer that counts how often it was asked.
pub struct ScriptedPrompt {
    answer: bool,
    pub asked: AtomicUsize,
}

impl ScriptedPrompt {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            asked: AtomicUsize::new(0),
        }
    }

    pub fn times_asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfirmPrompt for ScriptedPrompt {
    async fn confirm(&self, _patient: &Patient) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}

/// Controller over a recording store, with one registered account.
pub async fn controller(policy: FormPolicy) -> (RecordController, Arc<RecordingStore>) {
    let store = Arc::new(RecordingStore::new());
    let auth = Arc::new(LocalAuthProvider::new(store.inner.database()));
    auth.register(EMAIL, PASSWORD).await.unwrap();

    let controller = RecordController::new(store.clone(), auth, "users", policy);
    (controller, store)
}

/// Same as [`controller`], already signed in.
pub async fn signed_in(policy: FormPolicy) -> (RecordController, Arc<RecordingStore>) {
    let (controller, store) = controller(policy).await;
    controller.login(EMAIL, PASSWORD).await.unwrap();
    (controller, store)
}

/// Fill the add form with a complete, valid patient.
pub fn fill_new(controller: &RecordController, name: &str, dni: &str, ficha: &str) {
    controller.set_new_field(PatientField::Name, name);
    controller.set_new_field(PatientField::Dni, dni);
    controller.set_new_field(PatientField::Ficha, ficha);
    controller.set_new_field(PatientField::Carnet, format!("C-{}", ficha));
    controller.set_new_field(PatientField::ObraSocial, "osde");
}
