use ardent_index::{HashedIndex, MultiIndex, OrderedIndex};
use ardent_types::{Id, Transaction};
use commonware_runtime::Metrics;
use prometheus_client::metrics::{counter::Counter, gauge::Gauge};
use tracing::{debug, trace};

/// The maximum number of transactions in the mempool.
#[cfg(test)]
const DEFAULT_MAX_TRANSACTIONS: usize = 100_000;

/// A transaction along with the keys it is indexed by.
#[derive(Clone)]
struct Pending {
    id: Id,
    expiration: u64,
    transaction: Transaction,
}

type Pool = MultiIndex<Pending, (HashedIndex<Pending, Id>, OrderedIndex<Pending, u64>)>;

/// Deduplicates received transactions until they expire.
///
/// Transactions are tracked by id (to reject replays in constant time) and by
/// expiration (so everything that has aged out can be dropped as one prefix of
/// the expiration order).
pub struct Mempool {
    max_transactions: usize,
    pool: Pool,

    unique: Gauge,
    expired: Counter,
}

impl Mempool {
    /// Create a new mempool.
    #[cfg(test)]
    pub fn new(context: impl Metrics) -> Self {
        Self::new_with_limits(context, DEFAULT_MAX_TRANSACTIONS)
    }

    pub fn new_with_limits(context: impl Metrics, max_transactions: usize) -> Self {
        // Initialize metrics
        let unique = Gauge::default();
        let expired = Counter::default();
        context.register(
            "transactions",
            "Number of transactions in the mempool",
            unique.clone(),
        );
        context.register(
            "expired",
            "Number of transactions dropped after expiring",
            expired.clone(),
        );

        // Initialize mempool
        Self {
            max_transactions,
            pool: MultiIndex::new((
                HashedIndex::unique(|p: &Pending| p.id),
                OrderedIndex::non_unique(|p: &Pending| p.expiration),
            )),

            unique,
            expired,
        }
    }

    /// Add a transaction to the mempool.
    ///
    /// Returns `false` if the transaction is already tracked or the mempool is full.
    pub fn add(&mut self, tx: Transaction) -> bool {
        // If there are too many transactions, ignore
        if self.pool.len() >= self.max_transactions {
            debug!(max = self.max_transactions, "mempool full");
            return false;
        }

        let id = tx.id();
        let pending = Pending {
            id,
            expiration: tx.expiration,
            transaction: tx,
        };
        if self.pool.insert(pending).is_err() {
            trace!(?id, "duplicate transaction");
            return false;
        }
        self.unique.set(self.pool.len() as i64);
        true
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.pool.view(|i| &i.0).contains(id)
    }

    pub fn get(&self, id: &Id) -> Option<&Transaction> {
        self.pool
            .view(|i| &i.0)
            .get(id)
            .map(|pending| &pending.transaction)
    }

    /// Stop tracking a transaction (for example, once it has been included in a block).
    pub fn remove(&mut self, id: &Id) -> Option<Transaction> {
        let locator = self.pool.view(|i| &i.0).find(id)?;
        let removed = self.pool.erase(locator).map(|pending| pending.transaction);
        self.unique.set(self.pool.len() as i64);
        removed
    }

    /// Drop every transaction that expired strictly before `now` (seconds).
    ///
    /// Returns the number of transactions dropped.
    pub fn expire(&mut self, now: u64) -> usize {
        let by_expiration = self.pool.view(|i| &i.1);
        let (begin, end) = (by_expiration.begin(), by_expiration.lower_bound(now));
        let expired = self.pool.erase_range(|i| &i.1, &begin, &end);
        if expired > 0 {
            debug!(expired, now, remaining = self.pool.len(), "expired transactions");
            self.expired.inc_by(expired as u64);
            self.unique.set(self.pool.len() as i64);
        }
        expired
    }

    /// The transaction that will expire first.
    pub fn next_expiring(&self) -> Option<&Transaction> {
        self.pool
            .view(|i| &i.1)
            .first()
            .map(|pending| &pending.transaction)
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}
