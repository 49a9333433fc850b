//! Resources
//!
//! A resource is one versioned document: a page store plus the settings it
//! was created with. Opening a resource without any published revision
//! commits revision 0, which holds only the document root.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::crash_point::{maybe_crash, points};
use crate::dewey::DeweyId;
use crate::node::{NodeReadTrx, NodeWriteTrx, DOCUMENT_ROOT_KEY};
use crate::observability::{log_event_with_fields, Event};
use crate::page::{IndexType, User};
use crate::storage::{FileStorage, MemoryStorage, PageStorage};
use crate::trx::{PageReadTrx, PageStore, PageWriteTrx, VerifyReport};

use super::config::ResourceConfig;
use super::document_type::DocumentType;
use super::errors::{ResourceError, ResourceResult};

pub struct Resource {
    config: ResourceConfig,
    document_type: DocumentType,
    dir: Option<PathBuf>,
    user: Option<User>,
    store: Arc<PageStore>,
}

impl Resource {
    /// Opens the resource stored in `dir`, bootstrapping it if needed.
    pub fn open(
        dir: &Path,
        config: ResourceConfig,
        document_type: DocumentType,
        user: Option<User>,
    ) -> ResourceResult<Self> {
        config.validate()?;
        let storage = FileStorage::open(dir)?;
        let resource = Self::with_storage(Box::new(storage), config, document_type, user, Some(dir))?;

        let path = dir.display().to_string();
        let revision = resource
            .latest_revision()?
            .map(|r| r.to_string())
            .unwrap_or_default();
        log_event_with_fields(
            Event::ResourceOpened,
            &[
                ("path", path.as_str()),
                ("resource", resource.name()),
                ("revision", revision.as_str()),
            ],
        );
        Ok(resource)
    }

    /// Resource kept entirely in memory.
    pub fn in_memory(config: ResourceConfig, document_type: DocumentType) -> ResourceResult<Self> {
        config.validate()?;
        Self::with_storage(Box::new(MemoryStorage::new()), config, document_type, None, None)
    }

    /// Resource on a caller-supplied storage backend.
    pub fn with_storage(
        storage: Box<dyn PageStorage>,
        config: ResourceConfig,
        document_type: DocumentType,
        user: Option<User>,
        dir: Option<&Path>,
    ) -> ResourceResult<Self> {
        let store = PageStore::new(config.name.clone(), storage, config.store_options());
        let resource = Self {
            config,
            document_type,
            dir: dir.map(Path::to_path_buf),
            user,
            store,
        };
        if resource.store.latest_revision()?.is_none() {
            resource.bootstrap()?;
        }
        Ok(resource)
    }

    /// Commits revision 0 holding the document root.
    fn bootstrap(&self) -> ResourceResult<()> {
        let mut trx = self.begin_page_write()?;
        let key = trx.allocate_key(IndexType::Document, 0)?;
        if key != DOCUMENT_ROOT_KEY {
            return Err(ResourceError::Config(format!(
                "Bootstrap allocated key {} for the document root",
                key
            )));
        }

        let label = self.config.store_dewey_ids.then(DeweyId::new_root_id);
        let root = self.document_type.document_root(label);
        trx.set_record(DOCUMENT_ROOT_KEY, IndexType::Document, 0, root.to_record())?;

        maybe_crash(points::BOOTSTRAP_BEFORE_COMMIT);
        let revision = trx.commit(None)?.to_string();

        log_event_with_fields(
            Event::ResourceBootstrapped,
            &[
                ("document_type", self.document_type.as_str()),
                ("resource", self.name()),
                ("revision", revision.as_str()),
            ],
        );
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    pub fn document_type(&self) -> DocumentType {
        self.document_type
    }

    /// Directory of a file-backed resource.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn store(&self) -> &Arc<PageStore> {
        &self.store
    }

    pub fn latest_revision(&self) -> ResourceResult<Option<u32>> {
        Ok(self.store.latest_revision()?)
    }

    pub fn begin_page_read(&self, revision: Option<u32>) -> ResourceResult<PageReadTrx> {
        Ok(self.store.begin_read(revision)?)
    }

    pub fn begin_page_write(&self) -> ResourceResult<PageWriteTrx> {
        let mut trx = self.store.begin_write()?;
        if let Some(user) = &self.user {
            trx.set_user(user.clone());
        }
        Ok(trx)
    }

    /// Node reader on `revision`, or on the latest revision.
    pub fn begin_node_read(&self, revision: Option<u32>) -> ResourceResult<NodeReadTrx> {
        Ok(NodeReadTrx::new(self.begin_page_read(revision)?))
    }

    pub fn begin_node_write(&self) -> ResourceResult<NodeWriteTrx> {
        Ok(NodeWriteTrx::new(
            self.begin_page_write()?,
            self.document_type,
            self.config.store_dewey_ids,
        ))
    }

    /// Walks every page reachable from the published root.
    pub fn verify(&self) -> ResourceResult<VerifyReport> {
        Ok(self.store.verify()?)
    }
}
