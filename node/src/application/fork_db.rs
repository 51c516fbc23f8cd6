use ardent_index::{HashedIndex, MultiIndex, OrderedIndex};
use ardent_types::{BlockState, Id};
use std::{cmp::Reverse, collections::VecDeque};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ForkError {
    #[error("block {0} is already tracked")]
    Duplicate(Id),
    #[error("block {id} does not link to a known block (previous={previous})")]
    Unlinkable { id: Id, previous: Id },
    #[error("block {0} is not in the fork database")]
    UnknownBlock(Id),
    #[error("fork database is full ({max} blocks)")]
    Full { max: usize },
    #[error("index rejected update: {0}")]
    Index(#[from] ardent_index::Error),
}

/// Sort key placing current-branch blocks before other blocks of the same height.
type ByNum = (u32, Reverse<bool>);

/// Sort key placing the block with the highest irreversibility watermarks first.
type ByLib = (Reverse<u32>, Reverse<u32>, Reverse<u32>);

type Blocks = MultiIndex<
    BlockState,
    (
        HashedIndex<BlockState, Id>,
        OrderedIndex<BlockState, Id>,
        OrderedIndex<BlockState, ByNum>,
        OrderedIndex<BlockState, ByLib>,
    ),
>;

fn by_num(state: &BlockState) -> ByNum {
    (state.block_num, Reverse(state.in_current_chain))
}

fn by_lib(state: &BlockState) -> ByLib {
    (
        Reverse(state.dpos_irreversible_blocknum),
        Reverse(state.bft_irreversible_blocknum),
        Reverse(state.block_num),
    )
}

/// Candidate blocks that have not yet become irreversible.
///
/// Every tracked block links (through `previous`) back to `root`, the last
/// irreversible block, which is held outside the indices. The head is the
/// block with the best `(dpos lib, bft lib, height)`, ties going to the block
/// seen first.
pub struct ForkDatabase {
    root: BlockState,
    blocks: Blocks,
    max_blocks: usize,
}

impl ForkDatabase {
    pub fn new(root: BlockState, max_blocks: usize) -> Self {
        Self {
            root,
            blocks: MultiIndex::new((
                HashedIndex::unique(|s: &BlockState| s.id),
                OrderedIndex::non_unique(|s: &BlockState| s.previous),
                OrderedIndex::non_unique(by_num),
                OrderedIndex::non_unique(by_lib),
            )),
            max_blocks,
        }
    }

    /// Track a new candidate block, returning the id of the resulting head.
    pub fn add(&mut self, state: BlockState) -> Result<Id, ForkError> {
        if self.get(&state.id).is_some() {
            return Err(ForkError::Duplicate(state.id));
        }
        if self.blocks.len() >= self.max_blocks {
            return Err(ForkError::Full {
                max: self.max_blocks,
            });
        }
        if self.get(&state.previous).is_none() {
            return Err(ForkError::Unlinkable {
                id: state.id,
                previous: state.previous,
            });
        }

        let id = state.id;
        let height = state.block_num;
        match self.blocks.insert(state) {
            Ok(_) => {}
            Err(ardent_index::Error::DuplicateKey { .. }) => {
                return Err(ForkError::Duplicate(id));
            }
            Err(err) => return Err(err.into()),
        }

        let head = self.head().id;
        debug!(?id, height, ?head, "added block");
        Ok(head)
    }

    /// Look up a block, including the root.
    pub fn get(&self, id: &Id) -> Option<&BlockState> {
        if *id == self.root.id {
            return Some(&self.root);
        }
        self.blocks.view(|i| &i.0).get(id)
    }

    /// The best candidate, or the root if there are none.
    pub fn head(&self) -> &BlockState {
        self.blocks.view(|i| &i.3).first().unwrap_or(&self.root)
    }

    pub fn root(&self) -> &BlockState {
        &self.root
    }

    /// Number of blocks tracked above the root.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The current-branch block at height `num`, if any.
    pub fn block_in_current_chain_by_num(&self, num: u32) -> Option<&BlockState> {
        let by_num = self.blocks.view(|i| &i.2);
        by_num
            .at(&by_num.lower_bound((num,)))
            .filter(|state| state.block_num == num && state.in_current_chain)
    }

    pub fn mark_in_current_chain(
        &mut self,
        id: &Id,
        in_current_chain: bool,
    ) -> Result<(), ForkError> {
        let locator = self
            .blocks
            .view(|i| &i.0)
            .find(id)
            .ok_or(ForkError::UnknownBlock(*id))?;
        self.blocks
            .modify(locator, |state| state.in_current_chain = in_current_chain)?;
        Ok(())
    }

    /// Record that `id` reached BFT finality.
    ///
    /// The block's BFT watermark becomes its own height, and every descendant
    /// with a lower watermark is raised to match. Returns the resulting head.
    pub fn set_bft_irreversible(&mut self, id: &Id) -> Result<Id, ForkError> {
        let locator = self
            .blocks
            .view(|i| &i.0)
            .find(id)
            .ok_or(ForkError::UnknownBlock(*id))?;
        let mut watermark = 0;
        self.blocks.modify(locator, |state| {
            state.bft_irreversible_blocknum = state.block_num;
            watermark = state.block_num;
        })?;

        let mut queue = vec![*id];
        let mut raised = 0usize;
        while !queue.is_empty() {
            let mut next = Vec::new();
            for parent in queue {
                let children: Vec<_> = self
                    .blocks
                    .view(|i| &i.1)
                    .equal(parent)
                    .into_iter()
                    .filter(|(_, child)| child.bft_irreversible_blocknum < watermark)
                    .map(|(locator, child)| (locator, child.id))
                    .collect();
                for (locator, child) in children {
                    self.blocks
                        .modify(locator, |state| state.bft_irreversible_blocknum = watermark)?;
                    raised += 1;
                    next.push(child);
                }
            }
            queue = next;
        }

        let head = self.head().id;
        debug!(?id, watermark, raised, ?head, "set bft irreversible");
        Ok(head)
    }

    /// Walk back from `first` and `second` to their common ancestor.
    ///
    /// Each branch lists blocks from the tip down to (but excluding) the
    /// common ancestor. If one block is an ancestor of the other, its branch
    /// is empty.
    pub fn fetch_branch_from(
        &self,
        first: &Id,
        second: &Id,
    ) -> Result<(Vec<BlockState>, Vec<BlockState>), ForkError> {
        let lookup = |id: &Id| self.get(id).ok_or(ForkError::UnknownBlock(*id));
        let mut first_branch = Vec::new();
        let mut second_branch = Vec::new();
        let mut a = lookup(first)?;
        let mut b = lookup(second)?;

        while a.block_num > b.block_num {
            first_branch.push(a.clone());
            a = lookup(&a.previous)?;
        }
        while b.block_num > a.block_num {
            second_branch.push(b.clone());
            b = lookup(&b.previous)?;
        }
        while a.id != b.id {
            first_branch.push(a.clone());
            second_branch.push(b.clone());
            a = lookup(&a.previous)?;
            b = lookup(&b.previous)?;
        }
        Ok((first_branch, second_branch))
    }

    /// Ids of `id` and everything that builds on it, parents before children.
    fn subtree(&self, id: Id) -> Vec<Id> {
        let by_prev = self.blocks.view(|i| &i.1);
        let mut queue = VecDeque::from([id]);
        let mut found = Vec::new();
        while let Some(next) = queue.pop_front() {
            found.push(next);
            queue.extend(by_prev.equal(next).into_iter().map(|(_, child)| child.id));
        }
        found
    }

    fn erase_all(&mut self, ids: &[Id]) -> usize {
        let mut erased = 0;
        for id in ids {
            let locator = self.blocks.view(|i| &i.0).find(id);
            if let Some(locator) = locator {
                if self.blocks.erase(locator).is_some() {
                    erased += 1;
                }
            }
        }
        erased
    }

    /// Drop a block and every block built on it. Returns the number dropped.
    pub fn remove(&mut self, id: &Id) -> Result<usize, ForkError> {
        if !self.blocks.view(|i| &i.0).contains(id) {
            return Err(ForkError::UnknownBlock(*id));
        }
        let doomed = self.subtree(*id);
        let removed = self.erase_all(&doomed);
        debug!(?id, removed, "removed branch");
        Ok(removed)
    }

    /// Make `id` the new root.
    ///
    /// Only `id`'s descendants survive: the old root and every block that does
    /// not build on the new root are dropped. Returns the number dropped from
    /// the tracked set.
    pub fn advance_root(&mut self, id: &Id) -> Result<usize, ForkError> {
        let locator = self
            .blocks
            .view(|i| &i.0)
            .find(id)
            .ok_or(ForkError::UnknownBlock(*id))?;

        // Ancestors of the new root, back to (and including) the old root.
        let mut ancestors = Vec::new();
        let mut cursor = self.blocks.get(locator).map(|state| state.previous);
        while let Some(previous) = cursor {
            ancestors.push(previous);
            cursor = (previous != self.root.id)
                .then(|| self.blocks.view(|i| &i.0).get(&previous))
                .flatten()
                .map(|state| state.previous);
        }

        // Detach the new root first so clearing its ancestors spares its subtree.
        let new_root = self
            .blocks
            .erase(locator)
            .ok_or(ForkError::UnknownBlock(*id))?;
        let mut pruned = 1;
        for ancestor in ancestors {
            let doomed = self.subtree(ancestor);
            pruned += self.erase_all(&doomed);
        }

        info!(
            root = ?new_root.id,
            height = new_root.block_num,
            pruned,
            remaining = self.blocks.len(),
            "advanced root"
        );
        self.root = new_root;
        Ok(pruned)
    }

    /// Every tracked block in height order, current branch first at each height.
    pub fn blocks_by_num(&self) -> Vec<BlockState> {
        self.blocks.view(|i| &i.2).values()
    }

    #[cfg(test)]
    fn index_lens(&self) -> Vec<usize> {
        self.blocks.index_lens()
    }
}
