//! In-memory quad store
//!
//! The reference `QuadStore`: values are interned to dense ids, quads are
//! append-only rows with delete tombstones, and every direction has a hash
//! index from node id to quad rows. All store shapes are `Fixed` sets, so
//! the generic optimizer and the quad-index hooks do the planning.

use crate::error::{MemoryError, Result};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::sync::RwLock;
use tessera_db_core::{
    Delta, DeltaAction, Direction, IgnoreOpts, InternalQuad, Quad, Ref, Value,
};
use tessera_db_query::store::{IndexConstraints, StoreStats};
use tessera_db_query::{QuadStore, Shape};
use tracing::debug;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct RowKey {
    s: u64,
    p: u64,
    o: u64,
    l: Option<u64>,
}

struct QuadRow {
    key: RowKey,
    deleted: bool,
}

impl QuadRow {
    fn get(&self, d: Direction) -> Option<u64> {
        match d {
            Direction::Subject => Some(self.key.s),
            Direction::Predicate => Some(self.key.p),
            Direction::Object => Some(self.key.o),
            Direction::Label => self.key.l,
            Direction::Any => None,
        }
    }
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    values: FxHashMap<Value, u64>,
    names: FxHashMap<u64, Value>,
    rows: Vec<QuadRow>,
    /// (direction, node id) → rows where that direction holds the node.
    index: FxHashMap<(Direction, u64), Vec<usize>>,
    /// Live quads, for duplicate detection.
    present: FxHashMap<RowKey, usize>,
}

impl Inner {
    fn intern(&mut self, v: &Value) -> u64 {
        if let Some(&id) = self.values.get(v) {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.values.insert(v.clone(), id);
        self.names.insert(id, v.clone());
        id
    }

    fn key_of(&mut self, q: &Quad) -> RowKey {
        RowKey {
            s: self.intern(&q.subject),
            p: self.intern(&q.predicate),
            o: self.intern(&q.object),
            l: q.label.as_ref().map(|l| self.intern(l)),
        }
    }

    fn add(&mut self, q: &Quad, opts: IgnoreOpts) -> Result<()> {
        let key = self.key_of(q);
        if self.present.contains_key(&key) {
            if opts.ignore_dup {
                return Ok(());
            }
            return Err(MemoryError::QuadExists(q.clone()));
        }
        let row = self.rows.len();
        self.rows.push(QuadRow {
            key,
            deleted: false,
        });
        self.present.insert(key, row);
        for d in Direction::ALL {
            if let Some(id) = self.rows[row].get(d) {
                self.index.entry((d, id)).or_default().push(row);
            }
        }
        Ok(())
    }

    fn delete(&mut self, q: &Quad, opts: IgnoreOpts) -> Result<()> {
        let key = self.key_of(q);
        match self.present.remove(&key) {
            Some(row) => {
                self.rows[row].deleted = true;
                Ok(())
            }
            None => {
                if opts.ignore_missing {
                    Ok(())
                } else {
                    Err(MemoryError::QuadMissing(q.clone()))
                }
            }
        }
    }

    fn live_rows_at(&self, d: Direction, id: u64) -> Vec<usize> {
        self.index
            .get(&(d, id))
            .map(|rows| {
                rows.iter()
                    .copied()
                    .filter(|&r| !self.rows[r].deleted)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn node_id(&self, r: &Ref) -> Option<u64> {
        match r {
            Ref::Node(id) => Some(*id),
            Ref::PreFetched(v) => self.values.get(v.as_ref()).copied(),
            Ref::Quad(_) => None,
        }
    }

    /// Row indexes matching every constraint, live rows only.
    fn matching_rows(&self, constraints: &IndexConstraints) -> Option<Vec<usize>> {
        let mut resolved: Vec<(Direction, u64)> = Vec::with_capacity(constraints.len());
        for (d, r) in constraints {
            resolved.push((*d, self.node_id(r)?));
        }
        if resolved.is_empty() {
            return Some(
                self.rows
                    .iter()
                    .enumerate()
                    .filter(|(_, row)| !row.deleted)
                    .map(|(i, _)| i)
                    .collect(),
            );
        }
        // probe the smallest candidate list
        let (&(d0, id0), rest) = {
            let mut sorted = resolved.iter().collect::<Vec<_>>();
            sorted.sort_by_key(|(d, id)| self.index.get(&(*d, *id)).map(|v| v.len()).unwrap_or(0));
            let first = sorted[0];
            (
                first,
                resolved
                    .iter()
                    .filter(|c| *c != first)
                    .copied()
                    .collect::<Vec<_>>(),
            )
        };
        let out = self
            .live_rows_at(d0, id0)
            .into_iter()
            .filter(|&r| {
                rest.iter()
                    .all(|&(d, id)| self.rows[r].get(d) == Some(id))
            })
            .collect();
        Some(out)
    }
}

/// In-memory quad store.
#[derive(Default)]
pub struct MemStore {
    inner: RwLock<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with quads.
    pub fn with_quads(quads: impl IntoIterator<Item = Quad>) -> Result<Self> {
        let store = Self::new();
        let deltas: Vec<Delta> = quads.into_iter().map(Delta::add).collect();
        store.apply(&deltas, IgnoreOpts::default())?;
        Ok(store)
    }

    fn apply(&self, deltas: &[Delta], opts: IgnoreOpts) -> Result<()> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        for delta in deltas {
            match delta.action {
                DeltaAction::Add => inner.add(&delta.quad, opts)?,
                DeltaAction::Delete => inner.delete(&delta.quad, opts)?,
            }
        }
        debug!(total = inner.present.len(), "applied {} deltas", deltas.len());
        Ok(())
    }
}

impl QuadStore for MemStore {
    fn value_of(&self, v: &Value) -> Option<Ref> {
        let inner = self.inner.read().expect("store lock poisoned");
        inner.values.get(v).map(|&id| Ref::Node(id))
    }

    fn name_of(&self, r: &Ref) -> Option<Value> {
        match r {
            Ref::PreFetched(v) => Some(v.as_ref().clone()),
            Ref::Node(id) => {
                let inner = self.inner.read().expect("store lock poisoned");
                inner.names.get(id).cloned()
            }
            Ref::Quad(_) => None,
        }
    }

    fn quad(&self, r: &Ref) -> Option<Quad> {
        let Ref::Quad(i) = r else {
            return None;
        };
        let inner = self.inner.read().expect("store lock poisoned");
        let row = inner.rows.get(*i as usize)?;
        Some(Quad {
            subject: inner.names.get(&row.key.s)?.clone(),
            predicate: inner.names.get(&row.key.p)?.clone(),
            object: inner.names.get(&row.key.o)?.clone(),
            label: row.key.l.and_then(|l| inner.names.get(&l).cloned()),
        })
    }

    fn quad_iterator(&self, d: Direction, r: &Ref) -> Shape {
        let inner = self.inner.read().expect("store lock poisoned");
        let Some(id) = inner.node_id(r) else {
            return Shape::Null;
        };
        let rows = inner.live_rows_at(d, id);
        if rows.is_empty() {
            return Shape::Null;
        }
        Shape::Fixed(rows.into_iter().map(|i| Ref::Quad(i as u64)).collect())
    }

    fn quad_direction(&self, quad_ref: &Ref, d: Direction) -> Option<Ref> {
        let Ref::Quad(i) = quad_ref else {
            return None;
        };
        let inner = self.inner.read().expect("store lock poisoned");
        inner
            .rows
            .get(*i as usize)
            .and_then(|row| row.get(d))
            .map(Ref::Node)
    }

    fn all_nodes(&self) -> Shape {
        let inner = self.inner.read().expect("store lock poisoned");
        let mut ids = BTreeSet::new();
        for row in inner.rows.iter().filter(|r| !r.deleted) {
            for d in Direction::ALL {
                if let Some(id) = row.get(d) {
                    ids.insert(id);
                }
            }
        }
        if ids.is_empty() {
            return Shape::Null;
        }
        Shape::Fixed(ids.into_iter().map(Ref::Node).collect())
    }

    fn all_quads(&self) -> Shape {
        let inner = self.inner.read().expect("store lock poisoned");
        let rows: Vec<Ref> = inner
            .rows
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.deleted)
            .map(|(i, _)| Ref::Quad(i as u64))
            .collect();
        if rows.is_empty() {
            return Shape::Null;
        }
        Shape::Fixed(rows)
    }

    fn stats(&self) -> StoreStats {
        let inner = self.inner.read().expect("store lock poisoned");
        StoreStats {
            links: inner.present.len() as i64,
        }
    }

    fn apply_deltas(&self, deltas: &[Delta], opts: IgnoreOpts) -> tessera_db_core::Result<()> {
        self.apply(deltas, opts).map_err(Into::into)
    }

    fn size_of_index(&self, constraints: &IndexConstraints) -> Option<(i64, bool)> {
        let inner = self.inner.read().expect("store lock poisoned");
        let rows = inner.matching_rows(constraints)?;
        Some((rows.len() as i64, true))
    }

    fn lookup_quad_index(&self, constraints: &IndexConstraints) -> Option<InternalQuad> {
        let inner = self.inner.read().expect("store lock poisoned");
        let rows = inner.matching_rows(constraints)?;
        let [row] = rows.as_slice() else {
            return None;
        };
        let row = &inner.rows[*row];
        Some(InternalQuad {
            subject: Some(Ref::Node(row.key.s)),
            predicate: Some(Ref::Node(row.key.p)),
            object: Some(Ref::Node(row.key.o)),
            label: row.key.l.map(Ref::Node),
        })
    }
}
