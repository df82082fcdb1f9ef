use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;

use allocator_api2::alloc::Allocator;
use allocator_api2::alloc::Global;

use crate::DefaultHashBuilder;
use crate::capacity::DEFAULT_LOAD_FACTOR;
use crate::error::Error;
use crate::error::raise;
use crate::hash_table::Config;
use crate::hash_table::HashTable;
use crate::key_eq::DefaultKeyEq;
use crate::key_eq::KeyEq;

/// A hash map backed by the linear-probing [`HashTable`].
///
/// `HashMap<K, V, S, E, A>` hashes keys with the [`BuildHasher`] `S`,
/// compares them with the [`KeyEq`] predicate `E`, and stores its slot array
/// in memory obtained from the allocator `A`.
///
/// Empty slots hold default-constructed keys and values, so `K` and `V`
/// must implement [`Default`]. Inserting the default key itself is
/// supported.
///
/// # Performance Characteristics
///
/// - **Memory**: no per-slot metadata; each slot is exactly a `(K, V)` pair.
/// - **Lookups**: one hash, then a linear scan from the ideal slot that stops
///   at the first empty slot.
/// - **Growth**: the slot count doubles (or more) once the number of entries
///   reaches `capacity * load_factor`.
#[derive(Clone)]
pub struct HashMap<K, V, S = DefaultHashBuilder, E = DefaultKeyEq, A: Allocator = Global> {
    table: HashTable<K, V, E, A>,
    hash_builder: S,
}

impl<K, V, S, E, A> Debug for HashMap<K, V, S, E, A>
where
    K: Debug,
    V: Debug,
    E: KeyEq<K>,
    A: Allocator,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut map = f.debug_map();
        for (k, v) in self.table.entries() {
            map.entry(k, v);
        }
        map.finish()
    }
}

impl<K, V, S> Default for HashMap<K, V, S>
where
    K: Hash + Default + PartialEq,
    V: Default,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Default + PartialEq,
    V: Default,
    S: BuildHasher + Default,
{
    /// Creates an empty map. No storage is allocated until the first insert.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use open_hash::HashMap;
    ///
    /// let map: HashMap<u32, String> = HashMap::new();
    /// assert!(map.is_empty());
    /// assert_eq!(map.capacity(), 0);
    /// ```
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a map that holds at least `expected` entries before it grows.
    ///
    /// # Panics
    ///
    /// Panics if the slot count overflows.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use open_hash::HashMap;
    ///
    /// let map: HashMap<u32, u32> = HashMap::with_capacity(100);
    /// assert!(map.growth_threshold() >= 100);
    /// ```
    pub fn with_capacity(expected: usize) -> Self {
        Self::with_capacity_and_load_factor(expected, DEFAULT_LOAD_FACTOR)
    }

    /// Creates a map that holds at least `expected` entries before it grows,
    /// growing whenever the live entries exceed `load_factor` of the slots.
    ///
    /// # Panics
    ///
    /// Panics if `load_factor` is outside `(0, 1]` or the slot count
    /// overflows. Use [`HashMap::try_with_config`] to handle these as errors.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use open_hash::HashMap;
    ///
    /// let map: HashMap<u32, u32> = HashMap::with_capacity_and_load_factor(1, 0.5);
    /// assert_eq!(map.capacity(), 2);
    /// assert_eq!(map.load_factor(), 0.5);
    /// ```
    pub fn with_capacity_and_load_factor(expected: usize, load_factor: f32) -> Self {
        match Self::try_with_config(Config::new().expected(expected).load_factor(load_factor)) {
            Ok(map) => map,
            Err(err) => raise(err),
        }
    }

    /// Creates a map from `config` with the default hasher, key predicate
    /// and allocator.
    ///
    /// # Errors
    ///
    /// Fails on an invalid load factor, an unrepresentable slot count, or an
    /// allocation failure.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use open_hash::Config;
    /// use open_hash::ErrorKind;
    /// use open_hash::HashMap;
    ///
    /// let err = HashMap::<u32, u32>::try_with_config(Config::new().load_factor(0.0)).unwrap_err();
    /// assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    /// ```
    pub fn try_with_config(config: Config) -> Result<Self, Error> {
        Self::try_with_config_in(config, S::default(), DefaultKeyEq, Global)
    }
}

impl<K, V, S, A> HashMap<K, V, S, DefaultKeyEq, A>
where
    K: Hash + Default + PartialEq,
    V: Default,
    S: BuildHasher + Default,
    A: Allocator,
{
    /// Creates an empty map whose slot array will be allocated from `alloc`.
    pub fn new_in(alloc: A) -> Self {
        match Self::try_with_config_in(Config::new(), S::default(), DefaultKeyEq, alloc) {
            Ok(map) => map,
            Err(err) => raise(err),
        }
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Default + PartialEq,
    V: Default,
    S: BuildHasher,
{
    /// Creates an empty map with the given hasher builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use open_hash::HashMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let map: HashMap<i32, String, _> = HashMap::with_hasher(SimpleHasher);
    /// assert!(map.is_empty());
    /// ```
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(0, hash_builder)
    }

    /// Creates a map with the given hasher builder that holds at least
    /// `expected` entries before it grows.
    ///
    /// # Panics
    ///
    /// Panics if the slot count overflows.
    pub fn with_capacity_and_hasher(expected: usize, hash_builder: S) -> Self {
        match Self::try_with_config_in(
            Config::new().expected(expected),
            hash_builder,
            DefaultKeyEq,
            Global,
        ) {
            Ok(map) => map,
            Err(err) => raise(err),
        }
    }
}

impl<K, V, S, E> HashMap<K, V, S, E>
where
    K: Hash + Default,
    V: Default,
    S: BuildHasher,
    E: KeyEq<K>,
{
    /// Creates an empty map with the given hasher builder and key predicate.
    ///
    /// The predicate must agree with the hasher: keys it considers equal have
    /// to hash to the same value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use core::hash::Hasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use open_hash::HashMap;
    /// #
    /// # #[derive(Default)]
    /// # struct FirstByte;
    /// # struct FirstByteHasher(SipHasher);
    /// # impl Hasher for FirstByteHasher {
    /// #     fn write(&mut self, bytes: &[u8]) {
    /// #         if let Some(b) = bytes.first() {
    /// #             self.0.write_u8(*b);
    /// #         }
    /// #     }
    /// #     fn finish(&self) -> u64 {
    /// #         self.0.finish()
    /// #     }
    /// # }
    /// # impl BuildHasher for FirstByte {
    /// #     type Hasher = FirstByteHasher;
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         FirstByteHasher(SipHasher::new())
    /// #     }
    /// # }
    /// #
    /// let same_initial = |a: &String, b: &String| a.bytes().next() == b.bytes().next();
    /// let mut map: HashMap<String, i32, _, _> = HashMap::with_hasher_and_eq(FirstByte, same_initial);
    ///
    /// map.insert("apple".to_string(), 1);
    /// assert_eq!(map.insert("avocado".to_string(), 2), Some(1));
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn with_hasher_and_eq(hash_builder: S, key_eq: E) -> Self {
        match Self::try_with_config_in(Config::new(), hash_builder, key_eq, Global) {
            Ok(map) => map,
            Err(err) => raise(err),
        }
    }
}

impl<K, V, S, E, A> HashMap<K, V, S, E, A>
where
    K: Default,
    V: Default,
    E: KeyEq<K>,
    A: Allocator,
{
    /// Creates a map from `config` with every collaborator supplied.
    ///
    /// Every other constructor is a shorthand for this one.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidLoadFactor`] if `config.load_factor` is outside
    ///   `(0, 1]`.
    /// - [`Error::CapacityOverflow`] if the slot count is not representable.
    /// - [`Error::AllocError`] if `alloc` fails.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use allocator_api2::alloc::Global;
    /// use open_hash::Config;
    /// use open_hash::DefaultHashBuilder;
    /// use open_hash::DefaultKeyEq;
    /// use open_hash::HashMap;
    ///
    /// let map: HashMap<u64, u64> = HashMap::try_with_config_in(
    ///     Config::new().expected(12),
    ///     DefaultHashBuilder::default(),
    ///     DefaultKeyEq,
    ///     Global,
    /// )
    /// .unwrap();
    /// assert_eq!(map.capacity(), 16);
    /// ```
    pub fn try_with_config_in(
        config: Config,
        hash_builder: S,
        key_eq: E,
        alloc: A,
    ) -> Result<Self, Error> {
        Ok(Self {
            table: HashTable::try_with_config_in(config, key_eq, alloc)?,
            hash_builder,
        })
    }
}

impl<K, V, S, E, A: Allocator> HashMap<K, V, S, E, A> {
    /// Returns the number of entries in the map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use open_hash::HashMap;
    ///
    /// let mut map: HashMap<i32, &str> = HashMap::new();
    /// assert_eq!(map.len(), 0);
    /// map.insert(1, "a");
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map contains no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of slots in the backing array, zero before the
    /// first allocation.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Returns the number of entries the map holds before the next insert
    /// grows it.
    pub fn growth_threshold(&self) -> usize {
        self.table.growth_threshold()
    }

    /// Returns the load factor chosen at construction.
    pub fn load_factor(&self) -> f32 {
        self.table.load_factor()
    }

    /// Returns the largest slot count the backing array can describe.
    pub fn max_size(&self) -> usize {
        self.table.max_size()
    }

    /// Returns a reference to the map's hasher builder.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Returns a reference to the map's key predicate.
    pub fn key_eq(&self) -> &E {
        self.table.key_eq()
    }

    /// Returns a reference to the map's allocator.
    pub fn allocator(&self) -> &A {
        self.table.allocator()
    }
}

impl<K, V, S, E, A> HashMap<K, V, S, E, A>
where
    K: Hash,
    S: BuildHasher,
    E: KeyEq<K>,
    A: Allocator,
{
    /// Returns a reference to the value for `key`, if present.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use open_hash::HashMap;
    ///
    /// let mut map: HashMap<String, u32> = HashMap::new();
    /// map.insert("one".to_string(), 1);
    ///
    /// assert_eq!(map.get("one"), Some(&1));
    /// assert_eq!(map.get("two"), None);
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + ?Sized,
        E: KeyEq<Q>,
    {
        self.table.get(self.hash_builder.hash_one(key), |eq, k| {
            <E as KeyEq<Q>>::key_eq(eq, key, k.borrow())
        })
    }

    /// Returns a mutable reference to the value for `key`, if present.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + ?Sized,
        E: KeyEq<Q>,
    {
        let hash = self.hash_builder.hash_one(key);
        self.table
            .get_mut(hash, |eq, k| <E as KeyEq<Q>>::key_eq(eq, key, k.borrow()))
    }

    /// Returns a reference to the value for `key`.
    ///
    /// Unlike [`get_or_insert_default`](Self::get_or_insert_default), a
    /// missing key is an error and never inserts anything.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] if the key is not present, including
    /// when the map has not allocated yet.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use open_hash::Error;
    /// use open_hash::HashMap;
    ///
    /// let mut map: HashMap<&str, &str> = HashMap::new();
    /// assert_eq!(map.at("missing"), Err(Error::OutOfRange));
    ///
    /// map.insert("", "empty");
    /// assert_eq!(map.at(""), Ok(&"empty"));
    /// ```
    pub fn at<Q>(&self, key: &Q) -> Result<&V, Error>
    where
        K: Borrow<Q>,
        Q: Hash + ?Sized,
        E: KeyEq<Q>,
    {
        self.get(key).ok_or(Error::OutOfRange)
    }

    /// Returns a mutable reference to the value for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] if the key is not present.
    pub fn at_mut<Q>(&mut self, key: &Q) -> Result<&mut V, Error>
    where
        K: Borrow<Q>,
        Q: Hash + ?Sized,
        E: KeyEq<Q>,
    {
        self.get_mut(key).ok_or(Error::OutOfRange)
    }

    /// Returns `true` if the map contains `key`.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + ?Sized,
        E: KeyEq<Q>,
    {
        self.table.contains(self.hash_builder.hash_one(key), |eq, k| {
            <E as KeyEq<Q>>::key_eq(eq, key, k.borrow())
        })
    }

    /// Returns the number of entries stored under `key`: one or zero.
    pub fn count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + ?Sized,
        E: KeyEq<Q>,
    {
        usize::from(self.contains(key))
    }

    /// Computes how far each entry sits from its ideal slot.
    ///
    /// Requires the `stats` feature outside of tests.
    #[cfg(any(test, feature = "stats"))]
    pub fn probe_histogram(&self) -> crate::hash_table::ProbeHistogram {
        self.table
            .probe_histogram(|k| self.hash_builder.hash_one(k))
    }

    /// Returns utilization statistics for the underlying table.
    ///
    /// Requires the `stats` feature outside of tests.
    #[cfg(any(test, feature = "stats"))]
    pub fn debug_stats(&self) -> crate::hash_table::DebugStats {
        self.table.debug_stats(|k| self.hash_builder.hash_one(k))
    }
}

impl<K, V, S, E, A> HashMap<K, V, S, E, A>
where
    K: Hash + Default,
    V: Default,
    S: BuildHasher,
    E: KeyEq<K>,
    A: Allocator,
{
    /// Returns a mutable reference to the value for `key`, inserting
    /// `V::default()` first if the key is absent.
    ///
    /// A present key is looked up without constructing anything. An
    /// unallocated map allocates its minimum capacity first.
    ///
    /// # Panics
    ///
    /// Aborts through [`handle_alloc_error`](alloc::alloc::handle_alloc_error)
    /// if the map needs to grow and the allocator fails. Use
    /// [`try_get_or_insert_default`](Self::try_get_or_insert_default) to
    /// handle that as an error.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use open_hash::HashMap;
    ///
    /// let mut map: HashMap<String, String> = HashMap::new();
    /// *map.get_or_insert_default("test".to_string()) = "x".to_string();
    /// *map.get_or_insert_default("test".to_string()) = "y".to_string();
    ///
    /// assert_eq!(map.at("test").unwrap(), "y");
    /// assert_eq!(map.len(), 1);
    ///
    /// assert_eq!(map.get_or_insert_default("fresh".to_string()), "");
    /// assert_eq!(map.len(), 2);
    /// ```
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V {
        match self.try_get_or_insert_default(key) {
            Ok(value) => value,
            Err(err) => raise(err),
        }
    }

    /// Returns a mutable reference to the value for `key`, inserting
    /// `V::default()` first if the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocError`] or [`Error::CapacityOverflow`] if the
    /// map needed to grow and could not. The map is unchanged in that case.
    pub fn try_get_or_insert_default(&mut self, key: K) -> Result<&mut V, Error> {
        let hash = self.hash_builder.hash_one(&key);
        let hash_builder = &self.hash_builder;
        self.table
            .get_or_insert_with(hash, key, |k| hash_builder.hash_one(k), V::default)
    }

    /// Inserts a key-value pair, returning the previous value for the key.
    ///
    /// An existing entry keeps the key it was first inserted with.
    ///
    /// # Panics
    ///
    /// Aborts through [`handle_alloc_error`](alloc::alloc::handle_alloc_error)
    /// if the map needs to grow and the allocator fails.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use open_hash::HashMap;
    ///
    /// let mut map: HashMap<i32, &str> = HashMap::new();
    /// assert_eq!(map.insert(37, "a"), None);
    /// assert_eq!(map.insert(37, "b"), Some("a"));
    /// assert_eq!(map.at(&37), Ok(&"b"));
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.try_insert(key, value) {
            Ok(previous) => previous,
            Err(err) => raise(err),
        }
    }

    /// Inserts a key-value pair, returning the previous value for the key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocError`] or [`Error::CapacityOverflow`] if the
    /// map needed to grow and could not. The map is unchanged in that case.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<Option<V>, Error> {
        let hash = self.hash_builder.hash_one(&key);
        let hash_builder = &self.hash_builder;
        self.table
            .insert(hash, key, value, |k| hash_builder.hash_one(k))
    }

    /// Removes every entry while keeping the allocated capacity.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use open_hash::HashMap;
    ///
    /// let mut map: HashMap<i32, &str> = HashMap::new();
    /// map.insert(1, "a");
    /// let capacity = map.capacity();
    ///
    /// map.clear();
    /// assert!(map.is_empty());
    /// assert_eq!(map.capacity(), capacity);
    /// assert!(map.at(&1).is_err());
    /// ```
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Reserves room for at least `additional` more entries without growing
    /// again.
    ///
    /// # Panics
    ///
    /// Panics if the required slot count overflows, and aborts through
    /// [`handle_alloc_error`](alloc::alloc::handle_alloc_error) if the
    /// allocator fails.
    pub fn reserve(&mut self, additional: usize) {
        if let Err(err) = self.try_reserve(additional) {
            raise(err);
        }
    }

    /// Reserves room for at least `additional` more entries without growing
    /// again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityOverflow`] or [`Error::AllocError`] if the
    /// table cannot grow. The map is unchanged in that case.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use open_hash::HashMap;
    ///
    /// let mut map: HashMap<u32, u32> = HashMap::new();
    /// map.try_reserve(50).unwrap();
    /// assert!(map.growth_threshold() >= 50);
    /// assert!(map.try_reserve(usize::MAX).is_err());
    /// ```
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), Error> {
        let hash_builder = &self.hash_builder;
        self.table.reserve(additional, |k| hash_builder.hash_one(k))
    }
}
