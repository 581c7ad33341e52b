//! Open-addressing hash table with Robin-Hood insertion
//!
//! Backing store for the memoization table and the token cache. Slots live
//! in one flat vector with power-of-two capacity; insertion displaces
//! richer entries (those closer to their home slot) to keep probe
//! distances short, and the table doubles once it passes a 0.8 load
//! factor. Lookups probe from the home slot and stop at an empty slot or
//! when the occupant's probe distance drops below the query's, which
//! Robin-Hood ordering guarantees is a miss.

/// An entry storable in an [`RhTable`].
pub(crate) trait TableEntry {
    /// Precomputed hash of the entry's key.
    fn hash(&self) -> u64;
    /// Whether `other` carries the same key.
    fn matches(&self, other: &Self) -> bool;
}

const INITIAL_CAPACITY: usize = 16;

pub(crate) struct RhTable<T> {
    slots: Vec<Option<T>>,
    len: usize,
}

impl<T: TableEntry> RhTable<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            len: 0,
        }
    }

    /// Number of stored entries.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    #[inline]
    fn distance(&self, slot: usize, hash: u64) -> usize {
        let home = hash as usize & self.mask();
        (slot + self.slots.len() - home) & self.mask()
    }

    /// Find the entry with `hash` satisfying `pred`.
    pub(crate) fn get(&self, hash: u64, pred: impl Fn(&T) -> bool) -> Option<&T> {
        if self.slots.is_empty() {
            return None;
        }
        let mut slot = hash as usize & self.mask();
        let mut dist = 0;
        loop {
            match &self.slots[slot] {
                None => return None,
                Some(occupant) => {
                    if self.distance(slot, occupant.hash()) < dist {
                        return None;
                    }
                    if occupant.hash() == hash && pred(occupant) {
                        return Some(occupant);
                    }
                }
            }
            slot = (slot + 1) & self.mask();
            dist += 1;
        }
    }

    /// Insert `entry`, replacing any entry with the same key.
    pub(crate) fn insert(&mut self, entry: T) {
        if self.slots.is_empty() || (self.len + 1) * 5 > self.slots.len() * 4 {
            self.grow();
        }
        let mask = self.mask();
        let capacity = self.slots.len();
        let probe_distance = |slot: usize, hash: u64| (slot + capacity - (hash as usize & mask)) & mask;
        let mut candidate = entry;
        let mut slot = candidate.hash() as usize & mask;
        let mut dist = 0;
        loop {
            match &mut self.slots[slot] {
                empty @ None => {
                    *empty = Some(candidate);
                    self.len += 1;
                    return;
                }
                Some(occupant) => {
                    if occupant.hash() == candidate.hash() && occupant.matches(&candidate) {
                        *occupant = candidate;
                        return;
                    }
                    let occupant_dist = probe_distance(slot, occupant.hash());
                    if occupant_dist < dist {
                        // Rob the richer occupant and keep probing with it.
                        std::mem::swap(occupant, &mut candidate);
                        dist = occupant_dist;
                    }
                }
            }
            slot = (slot + 1) & mask;
            dist += 1;
        }
    }

    fn grow(&mut self) {
        let capacity = if self.slots.is_empty() {
            INITIAL_CAPACITY
        } else {
            self.slots.len() * 2
        };
        let old: Vec<Option<T>> = std::mem::take(&mut self.slots);
        self.slots = (0..capacity).map(|_| None).collect();
        self.len = 0;
        for entry in old.into_iter().flatten() {
            self.insert(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pair {
        key: u64,
        value: u64,
    }

    impl TableEntry for Pair {
        fn hash(&self) -> u64 {
            // Deliberately poor hash so collisions exercise displacement.
            self.key % 4
        }
        fn matches(&self, other: &Self) -> bool {
            self.key == other.key
        }
    }

    #[test]
    fn insert_and_get_through_collisions() {
        let mut table = RhTable::new();
        for key in 0..100u64 {
            table.insert(Pair {
                key,
                value: key * 10,
            });
        }
        assert_eq!(table.len(), 100);
        for key in 0..100u64 {
            let entry = table.get(key % 4, |p| p.key == key).unwrap();
            assert_eq!(entry.value, key * 10);
        }
        assert!(table.get(1, |p| p.key == 555).is_none());
    }

    #[test]
    fn insert_replaces_same_key() {
        let mut table = RhTable::new();
        table.insert(Pair { key: 7, value: 1 });
        table.insert(Pair { key: 7, value: 2 });
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(7 % 4, |p| p.key == 7).unwrap().value, 2);
    }

    #[test]
    fn grows_past_load_factor() {
        let mut table = RhTable::new();
        for key in 0..1000u64 {
            table.insert(Pair { key, value: key });
        }
        assert_eq!(table.len(), 1000);
        assert!(table.get(123 % 4, |p| p.key == 123).is_some());
    }
}
