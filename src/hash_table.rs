use core::alloc::Layout;
use core::fmt::Debug;
use core::marker::PhantomData;
use core::mem;
use core::ptr;
use core::ptr::NonNull;

use allocator_api2::alloc::Allocator;
use allocator_api2::alloc::Global;

use crate::capacity::DEFAULT_INITIAL_CAPACITY;
use crate::capacity::DEFAULT_LOAD_FACTOR;
use crate::capacity::DEFAULT_MIN_CAPACITY;
use crate::capacity::array_mask;
use crate::capacity::array_size;
use crate::capacity::is_power_of_two;
use crate::capacity::max_fill;
use crate::capacity::validate_load_factor;
use crate::error::Error;
use crate::error::raise;
use crate::key_eq::DefaultKeyEq;
use crate::key_eq::KeyEq;

/// One key/value cell of the slot array.
///
/// A slot whose key equals the default key is empty, unless it is the slot
/// recorded in `HashTable::default_key_slot`.
#[derive(Clone, Default)]
struct Slot<K, V> {
    key: K,
    value: V,
}

/// Sizing options for a new table.
///
/// # Examples
///
/// ```rust
/// use open_hash::Config;
///
/// let config = Config::new().expected(100).load_factor(0.5);
/// assert_eq!(config.expected, 100);
/// assert_eq!(Config::default().load_factor, 0.75);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Number of entries the table should hold before its first growth.
    pub expected: usize,
    /// Ratio of live entries to slots at which the table grows. Must lie in
    /// `(0, 1]`.
    pub load_factor: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// An unsized table with the default load factor.
    pub const fn new() -> Self {
        Self {
            expected: DEFAULT_INITIAL_CAPACITY,
            load_factor: DEFAULT_LOAD_FACTOR,
        }
    }

    /// Sets the number of entries to size the table for.
    pub const fn expected(mut self, expected: usize) -> Self {
        self.expected = expected;
        self
    }

    /// Sets the load factor.
    pub const fn load_factor(mut self, load_factor: f32) -> Self {
        self.load_factor = load_factor;
        self
    }
}

#[inline]
fn slot_layout<K, V>(capacity: usize) -> Result<Layout, Error> {
    Layout::array::<Slot<K, V>>(capacity).map_err(|_| Error::CapacityOverflow {
        requested: capacity,
    })
}

/// Allocates room for `capacity` slots without constructing them.
fn allocate_slots<K, V, A: Allocator>(
    alloc: &A,
    capacity: usize,
) -> Result<NonNull<Slot<K, V>>, Error> {
    let layout = slot_layout::<K, V>(capacity)?;
    if layout.size() == 0 {
        return Ok(NonNull::dangling());
    }

    match alloc.allocate(layout) {
        Ok(block) => Ok(block.cast()),
        Err(_) => Err(Error::AllocError { layout }),
    }
}

/// Allocates `capacity` slots and default-constructs every one of them.
fn construct_slots<K: Default, V: Default, A: Allocator>(
    alloc: &A,
    capacity: usize,
) -> Result<NonNull<Slot<K, V>>, Error> {
    let slots = allocate_slots::<K, V, A>(alloc, capacity)?;
    for index in 0..capacity {
        // SAFETY: The block holds `capacity` slots and `index < capacity`.
        unsafe { slots.add(index).write(Slot::default()) };
    }
    Ok(slots)
}

/// Returns a block to the allocator without touching its slots.
///
/// # Safety
///
/// `slots` must have been returned by `allocate_slots(alloc, capacity)` and
/// every slot must already be dropped or moved out.
unsafe fn deallocate_slots<K, V, A: Allocator>(
    alloc: &A,
    slots: NonNull<Slot<K, V>>,
    capacity: usize,
) {
    let size = mem::size_of::<Slot<K, V>>() * capacity;
    if size != 0 {
        // SAFETY: The same size and alignment produced a valid layout when the
        // block was allocated.
        unsafe {
            alloc.deallocate(
                slots.cast(),
                Layout::from_size_align_unchecked(size, mem::align_of::<Slot<K, V>>()),
            );
        }
    }
}

/// Destroys every slot in the block and returns it to the allocator.
///
/// # Safety
///
/// `slots` must have been returned by `allocate_slots(alloc, capacity)` with
/// all `capacity` slots constructed, and must not be used afterwards.
unsafe fn release_slots<K, V, A: Allocator>(
    alloc: &A,
    slots: NonNull<Slot<K, V>>,
    capacity: usize,
) {
    // SAFETY: Caller guarantees all `capacity` slots are constructed and owned.
    unsafe {
        ptr::drop_in_place(NonNull::slice_from_raw_parts(slots, capacity).as_ptr());
        deallocate_slots(alloc, slots, capacity);
    }
}

/// Check whether the slot at `index` is empty.
///
/// # Safety
///
/// `index` must be within the block and the slot must be constructed.
#[inline(always)]
unsafe fn is_vacant<K, V, E: KeyEq<K>>(
    slots: NonNull<Slot<K, V>>,
    index: usize,
    default_key: &K,
    default_key_slot: Option<usize>,
    key_eq: &E,
) -> bool {
    // SAFETY: Caller ensures `index` addresses a constructed slot.
    default_key_slot != Some(index)
        && key_eq.key_eq(unsafe { &slots.add(index).as_ref().key }, default_key)
}

/// An open-addressing hash table using linear probing over a power-of-two
/// slot array.
///
/// `HashTable<K, V, E, A>` owns its slot array, obtained from the allocator
/// `A`, and compares keys with the predicate `E`. Like a raw table, it does
/// not hash keys itself: every lookup is given the key's hash, and
/// operations that may grow the table are given a hasher to relocate the
/// entries already stored. [`HashMap`](crate::HashMap) binds a
/// [`BuildHasher`](core::hash::BuildHasher) to this table.
///
/// Empty slots are marked by the key type's default value rather than by
/// per-slot metadata. An entry whose key *is* the default value is tracked
/// by remembering the single slot it lives in.
///
/// All slots are default-constructed when the array is allocated, so both
/// `K` and `V` must implement [`Default`].
///
/// ## Example
///
/// ```rust
/// # use core::hash::Hash;
/// # use core::hash::Hasher;
/// #
/// # use open_hash::KeyEq;
/// # use open_hash::hash_table::HashTable;
/// # use siphasher::sip::SipHasher;
/// #
/// # fn hash_u64(n: &u64) -> u64 {
/// #     let mut hasher = SipHasher::new();
/// #     n.hash(&mut hasher);
/// #     hasher.finish()
/// # }
/// let mut table: HashTable<u64, &str> = HashTable::new();
///
/// table.insert(hash_u64(&7), 7, "seven", hash_u64).unwrap();
/// assert_eq!(
///     table.get(hash_u64(&7), |eq, k| eq.key_eq(&7, k)),
///     Some(&"seven")
/// );
/// ```
pub struct HashTable<K, V, E = DefaultKeyEq, A: Allocator = Global> {
    slots: NonNull<Slot<K, V>>,
    capacity: usize,
    mask: usize,

    populated: usize,
    max_pop: usize,
    load_factor: f32,
    min_capacity: usize,

    default_key: K,
    default_key_slot: Option<usize>,

    key_eq: E,
    alloc: A,

    _phantom: PhantomData<Slot<K, V>>,
}

// SAFETY: The table uniquely owns its slots; sending it sends the keys, values,
// predicate and allocator along with it.
unsafe impl<K: Send, V: Send, E: Send, A: Allocator + Send> Send for HashTable<K, V, E, A> {}

// SAFETY: Shared access only hands out shared references to keys and values.
unsafe impl<K: Sync, V: Sync, E: Sync, A: Allocator + Sync> Sync for HashTable<K, V, E, A> {}

impl<K, V, E, A> Debug for HashTable<K, V, E, A>
where
    K: Debug,
    V: Debug,
    E: KeyEq<K>,
    A: Allocator,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use alloc::format;
        use alloc::string::ToString;
        use alloc::vec::Vec;

        f.debug_struct("HashTable")
            .field(
                "slots",
                &(0..self.capacity)
                    .map(|index| {
                        if self.is_vacant(index) {
                            "..".to_string()
                        } else {
                            let slot = self.slot(index);
                            format!("{index:02}: {:?} => {:?}", slot.key, slot.value)
                        }
                    })
                    .collect::<Vec<_>>(),
            )
            .field("populated", &self.populated)
            .field("capacity", &self.capacity)
            .field("growth_threshold", &self.max_pop)
            .field("default_key_slot", &self.default_key_slot)
            .finish()
    }
}

impl<K, V, E, A> Clone for HashTable<K, V, E, A>
where
    K: Clone,
    V: Clone,
    E: Clone,
    A: Allocator + Clone,
{
    fn clone(&self) -> Self {
        let alloc = self.alloc.clone();
        let slots = match allocate_slots::<K, V, A>(&alloc, self.capacity) {
            Ok(slots) => slots,
            Err(err) => raise(err),
        };

        for index in 0..self.capacity {
            // SAFETY: Both blocks hold `capacity` slots. Placeholders are cloned too,
            // which keeps `default_key_slot` valid for the copy.
            unsafe { slots.add(index).write(self.slot(index).clone()) };
        }

        Self {
            slots,
            capacity: self.capacity,
            mask: self.mask,
            populated: self.populated,
            max_pop: self.max_pop,
            load_factor: self.load_factor,
            min_capacity: self.min_capacity,
            default_key: self.default_key.clone(),
            default_key_slot: self.default_key_slot,
            key_eq: self.key_eq.clone(),
            alloc,
            _phantom: PhantomData,
        }
    }
}

impl<K, V, E, A: Allocator> Drop for HashTable<K, V, E, A> {
    fn drop(&mut self) {
        // SAFETY: The table owns `capacity` constructed slots in `slots`. A zero
        // capacity destroys an empty slice and skips deallocation.
        unsafe { release_slots(&self.alloc, self.slots, self.capacity) }
    }
}

impl<K, V> HashTable<K, V, DefaultKeyEq, Global>
where
    K: Default + PartialEq,
    V: Default,
{
    /// Creates an empty table. No storage is allocated until the first
    /// insert.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INITIAL_CAPACITY)
    }

    /// Creates a table sized to hold `expected` entries at the default load
    /// factor before it grows.
    ///
    /// # Panics
    ///
    /// Panics if the slot count overflows, and aborts through
    /// [`handle_alloc_error`](alloc::alloc::handle_alloc_error) if the
    /// allocation fails.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use open_hash::hash_table::HashTable;
    /// #
    /// let table: HashTable<u64, u64> = HashTable::with_capacity(100);
    /// assert!(table.growth_threshold() >= 100);
    /// assert_eq!(table.capacity(), 256);
    /// ```
    pub fn with_capacity(expected: usize) -> Self {
        match Self::try_with_config_in(Config::new().expected(expected), DefaultKeyEq, Global) {
            Ok(table) => table,
            Err(err) => raise(err),
        }
    }
}

impl<K, V> Default for HashTable<K, V, DefaultKeyEq, Global>
where
    K: Default + PartialEq,
    V: Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, E, A: Allocator> HashTable<K, V, E, A> {
    /// Returns the number of entries in the table.
    pub fn len(&self) -> usize {
        self.populated
    }

    /// Returns `true` if the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.populated == 0
    }

    /// Returns the number of slots in the backing array. Zero means the
    /// table has not allocated yet.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of entries the table holds before the next insert
    /// grows it.
    pub fn growth_threshold(&self) -> usize {
        self.max_pop
    }

    /// Returns the load factor fixed at construction.
    pub fn load_factor(&self) -> f32 {
        self.load_factor
    }

    /// Returns the slot count allocated when an unallocated table receives
    /// its first insert.
    pub fn min_capacity(&self) -> usize {
        self.min_capacity
    }

    /// Returns the largest slot count the backing array can describe.
    pub fn max_size(&self) -> usize {
        isize::MAX as usize / mem::size_of::<Slot<K, V>>().max(1)
    }

    /// Returns the key predicate.
    pub fn key_eq(&self) -> &E {
        &self.key_eq
    }

    /// Returns the allocator backing the slot array.
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    #[inline(always)]
    fn slot(&self, index: usize) -> &Slot<K, V> {
        debug_assert!(index < self.capacity);
        // SAFETY: Callers only pass indexes masked into `0..capacity`, and all
        // slots in that range are constructed.
        unsafe { self.slots.add(index).as_ref() }
    }

    #[inline(always)]
    fn slot_mut(&mut self, index: usize) -> &mut Slot<K, V> {
        debug_assert!(index < self.capacity);
        // SAFETY: Callers only pass indexes masked into `0..capacity`, and all
        // slots in that range are constructed.
        unsafe { self.slots.add(index).as_mut() }
    }
}

impl<K, V, E, A> HashTable<K, V, E, A>
where
    E: KeyEq<K>,
    A: Allocator,
{
    #[inline(always)]
    fn is_vacant(&self, index: usize) -> bool {
        debug_assert!(index < self.capacity);
        // SAFETY: `index` is masked into `0..capacity` by every caller.
        unsafe {
            is_vacant(
                self.slots,
                index,
                &self.default_key,
                self.default_key_slot,
                &self.key_eq,
            )
        }
    }

    /// Probe for `matches` starting at the ideal slot of `hash`.
    ///
    /// Returns the matching slot and `true`, or the first empty slot on the
    /// probe sequence and `false`. The table must be allocated.
    #[inline]
    fn find(&self, hash: u64, matches: impl Fn(&E, &K) -> bool) -> (usize, bool) {
        debug_assert!(self.capacity > 0);
        debug_assert!(self.populated < self.capacity);

        let mut index = hash as usize & self.mask;
        loop {
            if self.is_vacant(index) {
                return (index, false);
            }
            if matches(&self.key_eq, &self.slot(index).key) {
                return (index, true);
            }
            index = (index + 1) & self.mask;
        }
    }

    /// Finds the value whose key satisfies `matches`.
    ///
    /// `matches` receives the table's key predicate and a stored key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use open_hash::KeyEq;
    /// # use open_hash::hash_table::HashTable;
    /// #
    /// let identity = |k: &u32| *k as u64;
    /// let mut table: HashTable<u32, char> = HashTable::new();
    /// table.insert(identity(&1), 1, 'a', identity).unwrap();
    ///
    /// assert_eq!(table.get(identity(&1), |eq, k| eq.key_eq(&1, k)), Some(&'a'));
    /// assert_eq!(table.get(identity(&2), |eq, k| eq.key_eq(&2, k)), None);
    /// ```
    pub fn get(&self, hash: u64, matches: impl Fn(&E, &K) -> bool) -> Option<&V> {
        if self.capacity == 0 {
            return None;
        }

        match self.find(hash, matches) {
            (index, true) => Some(&self.slot(index).value),
            _ => None,
        }
    }

    /// Finds the value whose key satisfies `matches`, returning a mutable
    /// reference.
    pub fn get_mut(&mut self, hash: u64, matches: impl Fn(&E, &K) -> bool) -> Option<&mut V> {
        if self.capacity == 0 {
            return None;
        }

        match self.find(hash, matches) {
            (index, true) => Some(&mut self.slot_mut(index).value),
            _ => None,
        }
    }

    /// Returns `true` if an entry's key satisfies `matches`.
    pub fn contains(&self, hash: u64, matches: impl Fn(&E, &K) -> bool) -> bool {
        self.capacity != 0 && self.find(hash, matches).1
    }

    /// Live entries in slot order.
    pub(crate) fn entries(&self) -> impl Iterator<Item = (&K, &V)> {
        (0..self.capacity)
            .filter(|&index| !self.is_vacant(index))
            .map(|index| {
                let slot = self.slot(index);
                (&slot.key, &slot.value)
            })
    }

    /// Computes how far each entry sits from its ideal slot.
    ///
    /// Requires the `stats` feature outside of tests.
    #[cfg(any(test, feature = "stats"))]
    pub fn probe_histogram(&self, hasher: impl Fn(&K) -> u64) -> ProbeHistogram {
        let mut counts = alloc::vec::Vec::new();
        for index in (0..self.capacity).filter(|&index| !self.is_vacant(index)) {
            let ideal = hasher(&self.slot(index).key) as usize & self.mask;
            let distance = index.wrapping_sub(ideal) & self.mask;
            if counts.len() <= distance {
                counts.resize(distance + 1, 0);
            }
            counts[distance] += 1;
        }

        ProbeHistogram { counts }
    }

    /// Returns utilization statistics for the table.
    ///
    /// Requires the `stats` feature outside of tests.
    #[cfg(any(test, feature = "stats"))]
    pub fn debug_stats(&self, hasher: impl Fn(&K) -> u64) -> DebugStats {
        let occupied_slots = (0..self.capacity)
            .filter(|&index| !self.is_vacant(index))
            .count();
        let slot_size = mem::size_of::<Slot<K, V>>();

        DebugStats {
            populated: self.populated,
            growth_threshold: self.max_pop,
            total_slots: self.capacity,
            occupied_slots,
            load_factor: self.load_factor as f64,
            slot_utilization: if self.capacity == 0 {
                0.0
            } else {
                occupied_slots as f64 / self.capacity as f64
            },
            total_bytes: self.capacity * slot_size,
            wasted_bytes: (self.capacity - occupied_slots) * slot_size,
            max_probe_length: self.probe_histogram(hasher).max_probe_length(),
        }
    }
}

impl<K, V, E, A> HashTable<K, V, E, A>
where
    K: Default,
    V: Default,
    E: KeyEq<K>,
    A: Allocator,
{
    /// Creates a table from `config`, comparing keys with `key_eq` and
    /// allocating from `alloc`.
    ///
    /// This is the constructor every other constructor funnels into. A
    /// non-zero `config.expected` allocates and default-constructs the slot
    /// array immediately.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidLoadFactor`] if the load factor is outside `(0, 1]`.
    /// - [`Error::CapacityOverflow`] if the slot count is not representable.
    /// - [`Error::AllocError`] if the allocator fails.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use allocator_api2::alloc::Global;
    /// # use open_hash::Config;
    /// # use open_hash::DefaultKeyEq;
    /// # use open_hash::hash_table::HashTable;
    /// #
    /// let config = Config::new().expected(1).load_factor(0.5);
    /// let table: HashTable<u8, u8> =
    ///     HashTable::try_with_config_in(config, DefaultKeyEq, Global).unwrap();
    /// assert_eq!(table.capacity(), 2);
    ///
    /// let bad = Config::new().load_factor(1.5);
    /// assert!(HashTable::<u8, u8>::try_with_config_in(bad, DefaultKeyEq, Global).is_err());
    /// ```
    pub fn try_with_config_in(config: Config, key_eq: E, alloc: A) -> Result<Self, Error> {
        let load_factor = validate_load_factor(config.load_factor)?;
        let capacity = array_size(config.expected, load_factor)?;
        let slots = construct_slots::<K, V, A>(&alloc, capacity)?;

        Ok(Self {
            slots,
            capacity,
            mask: array_mask(capacity),
            populated: 0,
            max_pop: max_fill(capacity, load_factor),
            load_factor,
            min_capacity: capacity.max(DEFAULT_MIN_CAPACITY),
            default_key: K::default(),
            default_key_slot: None,
            key_eq,
            alloc,
            _phantom: PhantomData,
        })
    }

    /// Returns the value stored for `key`, inserting `default()` first if the
    /// key is absent.
    ///
    /// An unallocated table allocates its minimum capacity first. If the
    /// table is at its growth threshold it grows before the new entry is
    /// written. `hash` must be `hasher(&key)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocError`] or [`Error::CapacityOverflow`] if the
    /// table needed to grow and could not. The table is unchanged in that
    /// case.
    pub fn get_or_insert_with(
        &mut self,
        hash: u64,
        key: K,
        hasher: impl Fn(&K) -> u64,
        default: impl FnOnce() -> V,
    ) -> Result<&mut V, Error> {
        if self.capacity == 0 {
            self.rehash(self.min_capacity, &hasher)?;
        }

        let (index, found) = self.find(hash, |eq, k| eq.key_eq(&key, k));
        let index = if found {
            index
        } else {
            self.insert_at(index, hash, key, default(), hasher)?
        };

        Ok(&mut self.slot_mut(index).value)
    }

    /// Inserts `value` for `key`, returning the value it replaced.
    ///
    /// An existing entry keeps its stored key and only has its value
    /// overwritten. `hash` must be `hasher(&key)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocError`] or [`Error::CapacityOverflow`] if the
    /// table needed to grow and could not. The table is unchanged in that
    /// case.
    pub fn insert(
        &mut self,
        hash: u64,
        key: K,
        value: V,
        hasher: impl Fn(&K) -> u64,
    ) -> Result<Option<V>, Error> {
        if self.capacity == 0 {
            self.rehash(self.min_capacity, &hasher)?;
        }

        let (index, found) = self.find(hash, |eq, k| eq.key_eq(&key, k));
        if found {
            return Ok(Some(mem::replace(&mut self.slot_mut(index).value, value)));
        }

        self.insert_at(index, hash, key, value, hasher)?;
        Ok(None)
    }

    /// Write a new entry at `index`, the vacant slot `find` returned for it.
    ///
    /// Grows first when the table is at its threshold, in which case the slot
    /// is looked up again in the new array.
    fn insert_at(
        &mut self,
        index: usize,
        hash: u64,
        key: K,
        value: V,
        hasher: impl Fn(&K) -> u64,
    ) -> Result<usize, Error> {
        let mut index = index;
        if self.populated == self.max_pop {
            let new_capacity = self.grown_capacity(self.populated + 1)?;
            self.rehash(new_capacity, &hasher)?;
            index = self.find(hash, |eq, k| eq.key_eq(&key, k)).0;
        }
        debug_assert!(self.is_vacant(index));

        let slot = self.slot_mut(index);
        slot.key = key;
        slot.value = value;
        if self.key_eq.key_eq(&self.slot(index).key, &self.default_key) {
            debug_assert!(self.default_key_slot.is_none());
            self.default_key_slot = Some(index);
        }
        self.populated += 1;

        debug_assert!(self.populated <= self.max_pop);
        Ok(index)
    }

    /// Grows the table so that `additional` more entries fit without another
    /// rehash. Never shrinks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityOverflow`] if the required slot count is not
    /// representable, or [`Error::AllocError`] if the allocator fails. The
    /// table is unchanged in either case.
    pub fn reserve(&mut self, additional: usize, hasher: impl Fn(&K) -> u64) -> Result<(), Error> {
        let required = self
            .populated
            .checked_add(additional)
            .ok_or(Error::CapacityOverflow {
                requested: usize::MAX,
            })?;
        if required <= self.max_pop {
            return Ok(());
        }

        let mut new_capacity = self.grown_capacity(required)?;
        if self.capacity == 0 {
            new_capacity = new_capacity.max(self.min_capacity);
        }
        self.rehash(new_capacity, &hasher)
    }

    /// Removes every entry, keeping the allocated slot array.
    ///
    /// Live slots are reset to default keys and values, walking the array
    /// from the end until every entry has been visited.
    pub fn clear(&mut self) {
        let mut index = self.capacity;
        while self.populated != 0 {
            index -= 1;
            if self.is_vacant(index) {
                continue;
            }

            if self.default_key_slot == Some(index) {
                self.default_key_slot = None;
            }
            let slot = self.slot_mut(index);
            slot.key = K::default();
            slot.value = V::default();
            self.populated -= 1;
        }

        self.default_key_slot = None;
    }

    /// Smallest slot count, larger than the current one, holding `required`
    /// entries.
    fn grown_capacity(&self, required: usize) -> Result<usize, Error> {
        let capacity = array_size(required, self.load_factor)?;
        if capacity > self.capacity {
            return Ok(capacity);
        }

        // At a load factor of 1.0 the clamp in `max_fill` can make the sized
        // array no larger than the current one.
        self.capacity
            .checked_mul(2)
            .ok_or(Error::CapacityOverflow {
                requested: self.capacity.saturating_mul(2),
            })
    }

    /// Move every entry into a new array of `new_capacity` slots.
    ///
    /// The new array is allocated before anything is touched, so a failed
    /// allocation leaves the table as it was.
    #[cold]
    #[inline(never)]
    fn rehash(&mut self, new_capacity: usize, hasher: &impl Fn(&K) -> u64) -> Result<(), Error> {
        debug_assert!(is_power_of_two(new_capacity));
        debug_assert!(new_capacity > self.capacity);

        let new_slots = construct_slots::<K, V, A>(&self.alloc, new_capacity)?;
        let new_mask = array_mask(new_capacity);
        let mut new_default_key_slot = None;

        // Detached until every entry has moved. If `hasher` or the key predicate
        // unwinds, the table is left empty and both blocks leak.
        let old_slots = mem::replace(&mut self.slots, NonNull::dangling());
        let old_capacity = mem::replace(&mut self.capacity, 0);
        let old_default_key_slot = self.default_key_slot.take();
        let populated = mem::replace(&mut self.populated, 0);
        self.mask = 0;
        self.max_pop = 0;

        let mut remaining = populated;
        let mut index = old_capacity;
        while index != 0 {
            index -= 1;

            // SAFETY: `index < old_capacity` and every old slot is constructed and
            // visited once: live entries are moved out with `ptr::read`, the rest
            // are dropped in place. Probing stays within `new_mask`, and the new
            // array always has a vacant slot because `populated < new_capacity`.
            unsafe {
                let old = old_slots.add(index).as_ptr();
                if remaining == 0
                    || is_vacant(
                        old_slots,
                        index,
                        &self.default_key,
                        old_default_key_slot,
                        &self.key_eq,
                    )
                {
                    ptr::drop_in_place(old);
                    continue;
                }
                remaining -= 1;

                let mut new_index = hasher(&(*old).key) as usize & new_mask;
                while !is_vacant(
                    new_slots,
                    new_index,
                    &self.default_key,
                    new_default_key_slot,
                    &self.key_eq,
                ) {
                    new_index = (new_index + 1) & new_mask;
                }

                let target = new_slots.add(new_index).as_ptr();
                drop(ptr::replace(target, ptr::read(old)));
                if self.key_eq.key_eq(&(*target).key, &self.default_key) {
                    new_default_key_slot = Some(new_index);
                }
            }
        }
        debug_assert_eq!(remaining, 0);

        // SAFETY: Every old slot was moved out or dropped above.
        unsafe { deallocate_slots(&self.alloc, old_slots, old_capacity) };

        self.slots = new_slots;
        self.capacity = new_capacity;
        self.mask = new_mask;
        self.max_pop = max_fill(new_capacity, self.load_factor);
        self.populated = populated;
        self.default_key_slot = new_default_key_slot;

        Ok(())
    }
}

/// Displacement of entries from their ideal slots.
///
/// `counts()[d]` is the number of entries stored `d` slots after the slot
/// their hash maps to.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeHistogram {
    counts: alloc::vec::Vec<usize>,
}

#[cfg(any(test, feature = "stats"))]
impl ProbeHistogram {
    /// Entry counts indexed by probe distance.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Total number of entries counted.
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// The longest probe distance of any entry, or zero for an empty table.
    pub fn max_probe_length(&self) -> usize {
        self.counts.len().saturating_sub(1)
    }

    /// Pretty-prints the histogram as a horizontal bar chart on stdout.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        let max = *self.counts.iter().max().unwrap_or(&0);
        if max == 0 {
            println!("probe histogram: empty");
            return;
        }

        let max_bar = 60usize;
        let total_units = max_bar * 8;
        println!("probe histogram ({} entries):", self.total());

        let make_bar = |count: usize| -> alloc::string::String {
            if count == 0 {
                return alloc::string::String::new();
            }
            let units = ((count as u128 * total_units as u128).div_ceil(max as u128)) as usize;
            let full = units / 8;
            let rem = units % 8;
            let mut bar = "█".repeat(full);
            if rem > 0 {
                bar.push(match rem {
                    1 => '▏',
                    2 => '▎',
                    3 => '▍',
                    4 => '▌',
                    5 => '▋',
                    6 => '▊',
                    _ => '▉',
                });
            }
            bar
        };

        for (distance, &count) in self.counts.iter().enumerate() {
            println!("{:>3} | {} ({})", distance, make_bar(count), count);
        }
    }
}

/// Utilization statistics for a table.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of entries currently in the table
    pub populated: usize,
    /// Number of entries at which the table grows
    pub growth_threshold: usize,
    /// Total number of slots allocated
    pub total_slots: usize,
    /// Number of slots currently holding an entry
    pub occupied_slots: usize,
    /// Configured load factor
    pub load_factor: f64,
    /// Slot utilization (occupied_slots / total_slots)
    pub slot_utilization: f64,
    /// Total memory in bytes used by the slot array
    pub total_bytes: usize,
    /// Bytes held by empty slots
    pub wasted_bytes: usize,
    /// Longest distance of any entry from its ideal slot
    pub max_probe_length: usize,
}

#[cfg(any(test, feature = "stats"))]
impl DebugStats {
    /// Pretty-print the debug statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Hash Table Debug Statistics ===");
        println!(
            "Population: {}/{} (threshold at {:.2}% load factor)",
            self.populated,
            self.growth_threshold,
            self.load_factor * 100.0
        );
        println!(
            "Slot Usage: {}/{} ({:.2}% utilization)",
            self.occupied_slots,
            self.total_slots,
            self.slot_utilization * 100.0
        );
        println!("Longest probe: {} slots", self.max_probe_length);
        println!("Total Allocated: {} bytes", self.total_bytes);
        println!(
            "Memory: {} bytes wasted ({:.02}%)",
            self.wasted_bytes,
            if self.total_bytes == 0 {
                0.0
            } else {
                (self.wasted_bytes as f64 / self.total_bytes as f64) * 100.0
            }
        );
    }
}
