//! Registry of percentile reservoirs keyed by metric name and source

use std::hash::{BuildHasher, Hash, Hasher};

use hashbrown::hash_map::RawEntryMut;
use tally_reservoir::Reservoir;

/// Identity of a percentile store: metric name plus optional source.
///
/// Sources are stored stringified, so a numeric source and a string source that render the same
/// text share one store. An absent source and an empty source are different keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PercentileKey {
    /// Metric name.
    pub event: String,
    /// Stringified source, if any.
    pub source: Option<String>,
}

impl PercentileKey {
    fn as_ref(&self) -> KeyRef<'_> {
        KeyRef {
            event: &self.event,
            source: self.source.as_deref(),
        }
    }
}

impl Hash for PercentileKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // must agree with KeyRef so borrowed lookups find owned keys
        self.as_ref().hash(state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct KeyRef<'a> {
    event: &'a str,
    source: Option<&'a str>,
}

impl KeyRef<'_> {
    fn into_owned(self) -> PercentileKey {
        PercentileKey {
            event: self.event.to_owned(),
            source: self.source.map(str::to_owned),
        }
    }
}

/// Lazily populated map from [`PercentileKey`] to [`Reservoir`].
///
/// A store is created the first time its key is recorded and lives as long as the registry.
#[derive(Debug)]
pub struct PercentileRegistry {
    stores: hashbrown::HashMap<PercentileKey, Reservoir>,
    capacity: usize,
}

impl PercentileRegistry {
    /// Create an empty registry whose reservoirs hold `capacity` values each.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "reservoir capacity must be positive");
        Self {
            stores: Default::default(),
            capacity,
        }
    }

    /// Capacity given to newly created reservoirs.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The reservoir for `(event, source)`, creating it on first use.
    pub fn get_or_create(&mut self, event: &str, source: Option<&str>) -> &mut Reservoir {
        let borrowed = KeyRef { event, source };
        let hash = self.stores.hasher().hash_one(borrowed);

        match self
            .stores
            .raw_entry_mut()
            .from_hash(hash, |k| k.as_ref() == borrowed)
        {
            RawEntryMut::Occupied(occupied) => occupied.into_mut(),
            RawEntryMut::Vacant(vacant) => {
                tracing::trace!(metric = event, ?source, "creating percentile store");
                let store = Reservoir::new(self.capacity);
                vacant
                    .insert_hashed_nocheck(hash, borrowed.into_owned(), store)
                    .1
            }
        }
    }

    /// The reservoir for `(event, source)`, if one was ever created.
    pub fn get(&self, event: &str, source: Option<&str>) -> Option<&Reservoir> {
        let borrowed = KeyRef { event, source };
        let hash = self.stores.hasher().hash_one(borrowed);
        self.stores
            .raw_entry()
            .from_hash(hash, |k| k.as_ref() == borrowed)
            .map(|(_, store)| store)
    }

    /// Number of reservoirs created so far.
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// Whether no reservoir was created yet.
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Keys of every reservoir, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &PercentileKey> {
        self.stores.keys()
    }
}
