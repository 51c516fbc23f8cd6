use ardent_types::{BlockState, Id, Transaction};
use commonware_runtime::Metrics;
use prometheus_client::metrics::gauge::Gauge;
use tracing::debug;

mod fork_db;
pub use fork_db::{ForkDatabase, ForkError};
mod mempool;
pub use mempool::Mempool;

/// Configuration for the application.
pub struct Config {
    /// The maximum number of transactions in the mempool.
    pub mempool_max_transactions: usize,

    /// The maximum number of unconfirmed blocks tracked above the root.
    pub fork_db_max_blocks: usize,
}

/// Pending transactions and candidate blocks of a single node.
pub struct Application {
    mempool: Mempool,
    fork_db: ForkDatabase,

    blocks: Gauge,
    head_height: Gauge,
}

impl Application {
    pub fn new(context: impl Metrics, config: Config, root: BlockState) -> Self {
        let blocks = Gauge::default();
        let head_height = Gauge::default();
        context.register(
            "fork_blocks",
            "Number of unconfirmed blocks in the fork database",
            blocks.clone(),
        );
        context.register(
            "head_height",
            "Height of the current head block",
            head_height.clone(),
        );
        head_height.set(root.block_num as i64);

        Self {
            mempool: Mempool::new_with_limits(
                context.with_label("mempool"),
                config.mempool_max_transactions,
            ),
            fork_db: ForkDatabase::new(root, config.fork_db_max_blocks),

            blocks,
            head_height,
        }
    }

    /// Track a received block and stop tracking the transactions it includes.
    ///
    /// Returns the id of the new head.
    pub fn on_block(&mut self, state: BlockState) -> Result<Id, ForkError> {
        let included: Vec<Id> = state.block.transactions.iter().map(|tx| tx.id()).collect();
        let head = self.fork_db.add(state)?;

        let mut evicted = 0usize;
        for id in &included {
            if self.mempool.remove(id).is_some() {
                evicted += 1;
            }
        }
        if evicted > 0 {
            debug!(evicted, "evicted included transactions");
        }

        self.refresh();
        Ok(head)
    }

    /// Track a received transaction. Returns `false` for a replay or when full.
    pub fn on_transaction(&mut self, tx: Transaction) -> bool {
        self.mempool.add(tx)
    }

    /// Record that `id` reached BFT finality. Returns the id of the new head.
    pub fn on_bft_irreversible(&mut self, id: &Id) -> Result<Id, ForkError> {
        let head = self.fork_db.set_bft_irreversible(id)?;
        self.refresh();
        Ok(head)
    }

    /// Make `id` the fork database root, pruning every branch that does not build on it.
    pub fn on_irreversible(&mut self, id: &Id) -> Result<usize, ForkError> {
        let pruned = self.fork_db.advance_root(id)?;
        self.refresh();
        Ok(pruned)
    }

    /// Drop a block that failed validation, along with everything built on it.
    pub fn on_invalid_block(&mut self, id: &Id) -> Result<usize, ForkError> {
        let removed = self.fork_db.remove(id)?;
        self.refresh();
        Ok(removed)
    }

    /// Drop transactions that expired before `now` (seconds).
    pub fn on_tick(&mut self, now: u64) -> usize {
        self.mempool.expire(now)
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    pub fn fork_db(&self) -> &ForkDatabase {
        &self.fork_db
    }

    fn refresh(&self) {
        self.blocks.set(self.fork_db.len() as i64);
        self.head_height.set(self.fork_db.head().block_num as i64);
    }
}
