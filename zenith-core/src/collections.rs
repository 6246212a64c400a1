use std::hash::{BuildHasher, Hasher};
use foldhash::fast::{FixedState, FoldHasher};
use foldhash::SharedSeed;

pub type SmallVec<A> = smallvec::SmallVec<A>;

pub struct DefaultHasher(FoldHasher);

pub mod hashmap {
    pub type HashMap<K, V> = hashbrown::HashMap<K, V>;
    pub use hashbrown::hash_map::*;
}

pub mod hashset {
    pub type HashSet<T> = hashbrown::HashSet<T>;
    pub use hashbrown::hash_set::*;
}

impl DefaultHasher {
    pub fn new() -> Self {
        Self(FoldHasher::with_seed(0, SharedSeed::global_random()))
    }

    /// Hasher whose output is stable for the whole process and between runs.
    /// Use it for content hashes that are compared across objects.
    pub fn fixed() -> Self {
        Self(FixedState::with_seed(0).build_hasher())
    }
}

impl Default for DefaultHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for DefaultHasher {
    #[inline(always)]
    fn finish(&self) -> u64 {
        self.0.finish()
    }
    
    #[inline(always)]
    fn write(&mut self, bytes: &[u8]) {
        self.0.write(bytes);
    }
}
