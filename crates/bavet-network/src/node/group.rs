//! Group node: folds the tuples sharing a key into one output tuple.
//!
//! Output facts are the key facts followed by the collector result, turned
//! into a fact. The result is computed when the queue is drained, so a group
//! that receives many changes in one cycle finishes its accumulator once,
//! and an update that leaves the output facts unchanged is not propagated.

use std::collections::HashMap;
use std::sync::Arc;

use bavet_core::{BavetError, Result, Score};

use super::{double_insert, unexpected_store};
use crate::collector::{Accumulator, Collector};
use crate::fact::{Fact, Facts, TupleMapper};
use crate::guard;
use crate::lifecycle::{InputSide, Node, NodeContext, Propagation, Propagator, TupleLifecycle};
use crate::queue::PropagationQueue;
use crate::tuple::{GroupId, Store, StoreIndex, TupleArena, TupleId};

/// How a group node derives the key of an input tuple.
#[derive(Clone)]
pub enum GroupKeys<V: Fact> {
    /// One key fact per mapper. No mappers puts every tuple in one group.
    Keys(Vec<TupleMapper<V>>),
    /// The input facts themselves, as used by `distinct`.
    WholeTuple,
}

impl<V: Fact> GroupKeys<V> {
    fn extract(&self, facts: &[Arc<V>]) -> Facts<V> {
        match self {
            GroupKeys::Keys(mappers) => mappers.iter().map(|m| Arc::new(m(facts))).collect(),
            GroupKeys::WholeTuple => facts.iter().cloned().collect(),
        }
    }
}

/// Turns a collector result into the trailing output fact.
pub type ResultFn<V, R> = Arc<dyn Fn(R) -> V + Send + Sync>;

struct Group<V: Fact, A> {
    key: Facts<V>,
    accumulator: A,
    out: TupleId,
    parent_count: usize,
}

pub struct GroupNode<V: Fact, C: Collector<V>> {
    label: String,
    keys: GroupKeys<V>,
    collector: Arc<C>,
    result_fact: Option<ResultFn<V, C::Result>>,
    group_store: StoreIndex,
    groups: Vec<Option<Group<V, C::Accumulator>>>,
    free_groups: Vec<usize>,
    group_index: HashMap<Facts<V>, GroupId>,
    out_groups: HashMap<TupleId, GroupId>,
    /// Extracted value of every contributing tuple, retracted verbatim later.
    contributions: HashMap<TupleId, C::Value>,
    queue: PropagationQueue,
    out_store_size: usize,
}

fn missing_group(label: &str, id: GroupId) -> BavetError {
    BavetError::impossible(format!("node ({}) has no group {:?}", label, id))
}

impl<V: Fact, C: Collector<V>> GroupNode<V, C> {
    pub fn new(
        label: impl Into<String>,
        keys: GroupKeys<V>,
        collector: Arc<C>,
        result_fact: Option<ResultFn<V, C::Result>>,
        group_store: StoreIndex,
        out_store_size: usize,
        queue_capacity: usize,
    ) -> Self {
        Self {
            label: label.into(),
            keys,
            collector,
            result_fact,
            group_store,
            groups: Vec::new(),
            free_groups: Vec::new(),
            group_index: HashMap::new(),
            out_groups: HashMap::new(),
            contributions: HashMap::new(),
            queue: PropagationQueue::with_capacity(queue_capacity),
            out_store_size,
        }
    }

    /// Number of non-empty groups.
    pub fn group_count(&self) -> usize {
        self.group_index.len()
    }

    /// Parent count of the group under `key`, if it exists.
    pub fn parent_count(&self, key: &[Arc<V>]) -> Option<usize> {
        let id = self.group_index.get(key)?;
        self.groups[id.0].as_ref().map(|g| g.parent_count)
    }

    fn key_and_value(&self, tuple: TupleId, tuples: &TupleArena<V>) -> Result<(Facts<V>, C::Value)> {
        let facts: &[Arc<V>] = tuples.get(tuple)?.facts();
        guard::call(&self.label, facts, || {
            (self.keys.extract(facts), self.collector.extract(facts))
        })
    }

    fn create_group(&mut self, key: Facts<V>, tuples: &mut TupleArena<V>) -> Result<GroupId> {
        let accumulator = guard::call(&self.label, key.as_slice(), || {
            self.collector.create_accumulator()
        })?;
        let out = tuples.alloc(key.clone(), self.out_store_size);
        self.queue.insert(tuples, out)?;
        let group = Group {
            key: key.clone(),
            accumulator,
            out,
            parent_count: 0,
        };
        let id = match self.free_groups.pop() {
            Some(index) => {
                self.groups[index] = Some(group);
                GroupId(index)
            }
            None => {
                self.groups.push(Some(group));
                GroupId(self.groups.len() - 1)
            }
        };
        self.group_index.insert(key, id);
        self.out_groups.insert(out, id);
        Ok(id)
    }

    fn insert_parent(&mut self, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        if !tuples.get(tuple)?.store(self.group_store).is_empty() {
            return Err(double_insert(&self.label, tuple));
        }
        let (key, value) = self.key_and_value(tuple, tuples)?;
        let id = match self.group_index.get(&key) {
            Some(id) => *id,
            None => self.create_group(key, tuples)?,
        };
        let group = self
            .groups
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| missing_group(&self.label, id))?;
        let facts: &[Arc<V>] = tuples.get(tuple)?.facts();
        guard::call(&self.label, facts, || group.accumulator.accumulate(&value))?;
        group.parent_count += 1;
        let out = group.out;

        self.contributions.insert(tuple, value);
        tuples
            .get_mut(tuple)?
            .set_store(self.group_store, Store::Group(id));
        self.queue.update(tuples, out)
    }

    fn retract_parent(&mut self, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        let id = match tuples.get_mut(tuple)?.take_store(self.group_store) {
            Store::Empty => return Ok(()),
            Store::Group(id) => id,
            other => return Err(unexpected_store(&self.label, tuple, &other)),
        };
        let value = self.contributions.remove(&tuple).ok_or_else(|| {
            BavetError::impossible(format!(
                "node ({}) has no contribution for tuple {:?}",
                self.label, tuple
            ))
        })?;
        let group = self
            .groups
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| missing_group(&self.label, id))?;
        let facts: &[Arc<V>] = tuples.get(tuple)?.facts();
        guard::call(&self.label, facts, || group.accumulator.retract(&value))?;
        group.parent_count -= 1;
        let out = group.out;

        if group.parent_count > 0 {
            return self.queue.update(tuples, out);
        }
        if let Some(group) = self.groups[id.0].take() {
            self.group_index.remove(&group.key);
        }
        self.free_groups.push(id.0);
        self.out_groups.remove(&out);
        self.queue.retract(tuples, out)
    }

    fn update_parent(&mut self, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        let id = match tuples.get(tuple)?.store(self.group_store) {
            Store::Empty => return self.insert_parent(tuple, tuples),
            Store::Group(id) => *id,
            other => return Err(unexpected_store(&self.label, tuple, other)),
        };
        let (key, value) = self.key_and_value(tuple, tuples)?;
        let group = self
            .groups
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| missing_group(&self.label, id))?;
        if group.key != key {
            self.retract_parent(tuple, tuples)?;
            return self.insert_parent(tuple, tuples);
        }

        let old = self.contributions.get(&tuple).ok_or_else(|| {
            BavetError::impossible(format!(
                "node ({}) has no contribution for tuple {:?}",
                self.label, tuple
            ))
        })?;
        let facts: &[Arc<V>] = tuples.get(tuple)?.facts();
        guard::call(&self.label, facts, || {
            group.accumulator.retract(old);
            group.accumulator.accumulate(&value);
        })?;
        let out = group.out;
        self.contributions.insert(tuple, value);
        self.queue.update(tuples, out)
    }
}

impl<V: Fact, C: Collector<V>, Sc: Score> TupleLifecycle<V, Sc> for GroupNode<V, C> {
    fn insert(&mut self, _: InputSide, tuple: TupleId, ctx: &mut NodeContext<'_, V, Sc>) -> Result<()> {
        self.insert_parent(tuple, ctx.tuples)
    }

    fn update(&mut self, _: InputSide, tuple: TupleId, ctx: &mut NodeContext<'_, V, Sc>) -> Result<()> {
        self.update_parent(tuple, ctx.tuples)
    }

    fn retract(&mut self, _: InputSide, tuple: TupleId, ctx: &mut NodeContext<'_, V, Sc>) -> Result<()> {
        self.retract_parent(tuple, ctx.tuples)
    }
}

impl<V: Fact, C: Collector<V>, Sc: Score> Propagator<V, Sc> for GroupNode<V, C> {
    fn propagate(&mut self, ctx: &mut NodeContext<'_, V, Sc>, out: &mut Vec<Propagation>) -> Result<()> {
        let Self {
            label,
            result_fact,
            groups,
            out_groups,
            queue,
            ..
        } = self;
        let label = label.as_str();
        queue.propagate(
            ctx.tuples,
            |id, tuple| {
                let group_id = out_groups.get(&id).copied().ok_or_else(|| {
                    BavetError::impossible(format!(
                        "node ({}) has no group for output {:?}",
                        label, id
                    ))
                })?;
                let group = groups
                    .get(group_id.0)
                    .and_then(Option::as_ref)
                    .ok_or_else(|| missing_group(label, group_id))?;
                let mut facts = group.key.clone();
                if let Some(to_fact) = result_fact.as_ref() {
                    let result = guard::call(label, group.key.as_slice(), || {
                        to_fact(group.accumulator.finish())
                    })?;
                    facts.push(Arc::new(result));
                }
                Ok(tuple.refresh_facts(facts))
            },
            out,
        )
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl<V: Fact, C: Collector<V>, Sc: Score> Node<V, Sc> for GroupNode<V, C> {
    fn label(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{count, sum, CountCollector, NoCollector};
    use crate::node::testing::Harness;
    use crate::tuple::TupleState;
    use bavet_core::SimpleScore;
    use smallvec::smallvec;

    fn count_by_parity() -> GroupNode<i64, CountCollector<i64>> {
        let parity: TupleMapper<i64> = Arc::new(|t: &[Arc<i64>]| *t[0] % 2);
        let to_fact: ResultFn<i64, usize> = Arc::new(|n: usize| n as i64);
        GroupNode::new(
            "groupBy(parity, count)",
            GroupKeys::Keys(vec![parity]),
            Arc::new(count()),
            Some(to_fact),
            StoreIndex(0),
            0,
            4,
        )
    }

    fn insert<C: Collector<i64>>(node: &mut GroupNode<i64, C>, h: &mut Harness<i64>, id: TupleId) {
        TupleLifecycle::<i64, SimpleScore>::insert(node, InputSide::Single, id, &mut h.ctx()).unwrap();
    }

    fn values(h: &Harness<i64>, id: TupleId) -> Vec<i64> {
        h.tuples.get(id).unwrap().facts().iter().map(|f| **f).collect()
    }

    #[test]
    fn test_group_retracted_once_after_last_parent() {
        let mut h: Harness<i64> = Harness::new();
        let mut node = count_by_parity();
        let parents: Vec<TupleId> = [1, 3, 5].iter().map(|v| h.parent(vec![*v], 1)).collect();
        for &p in &parents {
            insert(&mut node, &mut h, p);
        }
        let settled = h.flush(&mut node);
        assert_eq!(settled.len(), 1);
        let out = settled[0].tuple();
        assert_eq!(values(&h, out), vec![1, 3]);

        node.retract(InputSide::Single, parents[0], &mut h.ctx()).unwrap();
        node.retract(InputSide::Single, parents[1], &mut h.ctx()).unwrap();
        assert_eq!(node.parent_count(&[Arc::new(1)]), Some(1));
        assert_eq!(h.flush(&mut node), vec![Propagation::Update(out)]);

        node.retract(InputSide::Single, parents[2], &mut h.ctx()).unwrap();
        assert_eq!(h.flush(&mut node), vec![Propagation::Retract(out)]);
        assert_eq!(node.group_count(), 0);
    }

    #[test]
    fn test_key_change_moves_parent_between_groups() {
        let mut h: Harness<i64> = Harness::new();
        let mut node = count_by_parity();
        let a = h.parent(vec![1], 1);
        let b = h.parent(vec![2], 1);
        insert(&mut node, &mut h, a);
        insert(&mut node, &mut h, b);
        h.flush(&mut node);

        h.tuples.get_mut(a).unwrap().set_facts(smallvec![Arc::new(4)]);
        node.update(InputSide::Single, a, &mut h.ctx()).unwrap();
        assert_eq!(node.group_count(), 1);
        assert_eq!(node.parent_count(&[Arc::new(0)]), Some(2));

        let settled = h.flush(&mut node);
        assert_eq!(settled.len(), 2);
        let even = settled
            .iter()
            .find(|p| matches!(p, Propagation::Update(_)))
            .unwrap()
            .tuple();
        assert_eq!(values(&h, even), vec![0, 2]);
    }

    #[test]
    fn test_unchanged_result_is_not_propagated() {
        let mut h: Harness<i64> = Harness::new();
        let mut node = count_by_parity();
        let a = h.parent(vec![1], 1);
        insert(&mut node, &mut h, a);
        let out = h.flush(&mut node)[0].tuple();

        h.tuples.get_mut(a).unwrap().set_facts(smallvec![Arc::new(7)]);
        node.update(InputSide::Single, a, &mut h.ctx()).unwrap();
        assert!(h.flush(&mut node).is_empty());
        assert_eq!(h.tuples.state(out).unwrap(), TupleState::Ok);
    }

    #[test]
    fn test_sum_follows_updates_within_group() {
        let mut h: Harness<i64> = Harness::new();
        let to_fact: ResultFn<i64, i64> = Arc::new(|total: i64| total);
        let mut node = GroupNode::new(
            "groupBy(sum)",
            GroupKeys::Keys(Vec::new()),
            Arc::new(sum(|t: &[Arc<i64>]| *t[0])),
            Some(to_fact),
            StoreIndex(0),
            0,
            4,
        );
        let a = h.parent(vec![10], 1);
        let b = h.parent(vec![5], 1);
        insert(&mut node, &mut h, a);
        insert(&mut node, &mut h, b);
        let out = h.flush(&mut node)[0].tuple();
        assert_eq!(values(&h, out), vec![15]);

        h.tuples.get_mut(b).unwrap().set_facts(smallvec![Arc::new(-5)]);
        node.update(InputSide::Single, b, &mut h.ctx()).unwrap();
        assert_eq!(h.flush(&mut node), vec![Propagation::Update(out)]);
        assert_eq!(values(&h, out), vec![5]);
    }

    #[test]
    fn test_whole_tuple_key_deduplicates() {
        let mut h: Harness<i64> = Harness::new();
        let mut node: GroupNode<i64, NoCollector> = GroupNode::new(
            "distinct",
            GroupKeys::WholeTuple,
            Arc::new(NoCollector),
            None,
            StoreIndex(0),
            0,
            4,
        );
        for v in [3, 3, 4] {
            let p = h.parent(vec![v], 1);
            insert(&mut node, &mut h, p);
        }
        let settled = h.flush(&mut node);
        assert_eq!(settled.len(), 2);
        let mut distinct: Vec<i64> = settled.iter().map(|p| values(&h, p.tuple())[0]).collect();
        distinct.sort();
        assert_eq!(distinct, vec![3, 4]);
    }

    #[test]
    fn test_panicking_key_names_the_node() {
        let mut h: Harness<i64> = Harness::new();
        let broken: TupleMapper<i64> = Arc::new(|_: &[Arc<i64>]| -> i64 { panic!("no key") });
        let mut node: GroupNode<i64, NoCollector> = GroupNode::new(
            "groupBy(broken)",
            GroupKeys::Keys(vec![broken]),
            Arc::new(NoCollector),
            None,
            StoreIndex(0),
            0,
            4,
        );
        let p = h.parent(vec![1], 1);
        let err = TupleLifecycle::<i64, SimpleScore>::insert(&mut node, InputSide::Single, p, &mut h.ctx())
            .unwrap_err();
        match err {
            BavetError::UserCode { site, message } => {
                assert!(site.starts_with("groupBy(broken)"));
                assert_eq!(message, "no key");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
