//! Top-level context over a flat-file data directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use tracing::info;

use stockdesk_audit::FileAuditSink;
use stockdesk_budget::{BudgetStore, BudgetTracker};
use stockdesk_catalog::FileCatalog;
use stockdesk_purchasing::{OrderStore, OrderWorkflow};
use stockdesk_reservations::{ReservationManager, ReservationStore};
use stockdesk_store::RecordFile;

const PRODUCTS_FILE: &str = "products.txt";
const RESERVATIONS_FILE: &str = "reservations.txt";
const BUDGETS_FILE: &str = "budgets.txt";
const PURCHASE_ORDERS_FILE: &str = "purchase_orders.txt";
const AUDIT_LOG_FILE: &str = "audit_log.txt";

/// All services wired over one data directory.
///
/// Every service holds its own file handle; nothing here is global. Two
/// contexts over different directories are fully independent, which is
/// what the test suites lean on.
pub struct OpsContext {
    data_dir: PathBuf,
    pub catalog: Arc<FileCatalog>,
    pub reservations: ReservationManager,
    pub budget: BudgetTracker,
    pub orders: OrderWorkflow,
    pub audit: Arc<FileAuditSink>,
}

impl OpsContext {
    /// Open (creating if needed) the data directory and wire every
    /// service over its file.
    pub fn open(data_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        stockdesk_observability::init();

        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("creating data directory {}", data_dir.display()))?;

        let file = |name: &str| RecordFile::new(data_dir.join(name));

        let audit = Arc::new(FileAuditSink::new(file(AUDIT_LOG_FILE)));
        let catalog = Arc::new(FileCatalog::new(file(PRODUCTS_FILE)));
        let reservations = ReservationManager::new(
            catalog.clone(),
            ReservationStore::new(file(RESERVATIONS_FILE)),
            audit.clone(),
        );
        let budget = BudgetTracker::new(BudgetStore::new(file(BUDGETS_FILE)), audit.clone());
        let orders = OrderWorkflow::new(
            catalog.clone(),
            OrderStore::new(file(PURCHASE_ORDERS_FILE)),
            audit.clone(),
        );

        info!(dir = %data_dir.display(), "opened data directory");
        Ok(Self {
            data_dir,
            catalog,
            reservations,
            budget,
            orders,
            audit,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
