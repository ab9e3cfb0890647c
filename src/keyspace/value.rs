use std::{
    cmp::Ordering,
    collections::{BTreeSet, HashMap, HashSet, VecDeque},
};

use bytes::Bytes;

/// A typed value held under a key.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    String(Bytes),
    List(VecDeque<Bytes>),
    Hash(HashMap<Bytes, Bytes>),
    Set(HashSet<Bytes>),
    SortedSet(SortedSet),
}

impl DataValue {
    /// Name reported by `TYPE`.
    pub fn type_name(&self) -> &'static str {
        match self {
            DataValue::String(_) => "string",
            DataValue::List(_) => "list",
            DataValue::Hash(_) => "hash",
            DataValue::Set(_) => "set",
            DataValue::SortedSet(_) => "zset",
        }
    }

    /// Collections with no elements are never kept in a store.
    pub fn is_empty_collection(&self) -> bool {
        match self {
            DataValue::String(_) => false,
            DataValue::List(list) => list.is_empty(),
            DataValue::Hash(hash) => hash.is_empty(),
            DataValue::Set(set) => set.is_empty(),
            DataValue::SortedSet(zset) => zset.is_empty(),
        }
    }

    pub fn new_list() -> Self {
        DataValue::List(VecDeque::new())
    }

    pub fn new_hash() -> Self {
        DataValue::Hash(HashMap::new())
    }

    pub fn new_set() -> Self {
        DataValue::Set(HashSet::new())
    }

    pub fn new_sorted_set() -> Self {
        DataValue::SortedSet(SortedSet::default())
    }

    pub fn as_string(&self) -> Option<&Bytes> {
        match self {
            DataValue::String(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&VecDeque<Bytes>> {
        match self {
            DataValue::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut VecDeque<Bytes>> {
        match self {
            DataValue::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_hash(&self) -> Option<&HashMap<Bytes, Bytes>> {
        match self {
            DataValue::Hash(hash) => Some(hash),
            _ => None,
        }
    }

    pub fn as_hash_mut(&mut self) -> Option<&mut HashMap<Bytes, Bytes>> {
        match self {
            DataValue::Hash(hash) => Some(hash),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&HashSet<Bytes>> {
        match self {
            DataValue::Set(set) => Some(set),
            _ => None,
        }
    }

    pub fn as_set_mut(&mut self) -> Option<&mut HashSet<Bytes>> {
        match self {
            DataValue::Set(set) => Some(set),
            _ => None,
        }
    }

    pub fn as_sorted_set(&self) -> Option<&SortedSet> {
        match self {
            DataValue::SortedSet(zset) => Some(zset),
            _ => None,
        }
    }

    pub fn as_sorted_set_mut(&mut self) -> Option<&mut SortedSet> {
        match self {
            DataValue::SortedSet(zset) => Some(zset),
            _ => None,
        }
    }
}

/// Score wrapper with a total order. NaN never gets in: callers reject it
/// before insertion.
#[derive(Debug, Clone, Copy)]
struct Score(f64);

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Members ordered by score, ties broken by member bytes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortedSet {
    scores: HashMap<Bytes, f64>,
    ordered: BTreeSet<(Score, Bytes)>,
}

impl SortedSet {
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).copied()
    }

    /// Sets `member` to `score`. Returns `true` when the member is new.
    pub fn insert(&mut self, member: Bytes, score: f64) -> bool {
        // -0.0 and 0.0 must sort as the same score
        let score = if score == 0.0 { 0.0 } else { score };

        let previous = self.scores.insert(member.clone(), score);
        if let Some(previous) = previous {
            self.ordered.remove(&(Score(previous), member.clone()));
        }
        self.ordered.insert((Score(score), member));
        previous.is_none()
    }

    pub fn remove(&mut self, member: &[u8]) -> bool {
        match self.scores.remove_entry(member) {
            Some((member, score)) => {
                self.ordered.remove(&(Score(score), member));
                true
            }
            None => false,
        }
    }

    /// 0-based position of `member` in ascending score order.
    pub fn rank(&self, member: &[u8]) -> Option<usize> {
        let score = self.score(member)?;
        Some(
            self.ordered
                .iter()
                .take_while(|(other, name)| (*other, &name[..]) < (Score(score), member))
                .count(),
        )
    }

    /// Members with their scores in ascending order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&Bytes, f64)> + '_ {
        self.ordered.iter().map(|(score, member)| (member, score.0))
    }
}
