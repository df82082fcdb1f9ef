/// Equality predicate used to compare keys.
///
/// Implementations must be reflexive, symmetric and transitive, and must
/// agree with the hasher: keys that compare equal have to hash equally.
///
/// Any `Fn(&K, &K) -> bool` closure implements `KeyEq<K>`, so a custom
/// comparison can be passed directly.
///
/// # Examples
///
/// ```rust
/// use open_hash::KeyEq;
///
/// let case_insensitive = |a: &String, b: &String| a.eq_ignore_ascii_case(b);
/// assert!(case_insensitive.key_eq(&"KEY".to_string(), &"key".to_string()));
/// ```
pub trait KeyEq<Q: ?Sized> {
    /// Returns `true` if `a` and `b` denote the same key.
    fn key_eq(&self, a: &Q, b: &Q) -> bool;
}

/// The default equality predicate, delegating to [`PartialEq`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DefaultKeyEq;

impl<Q: PartialEq + ?Sized> KeyEq<Q> for DefaultKeyEq {
    #[inline(always)]
    fn key_eq(&self, a: &Q, b: &Q) -> bool {
        a == b
    }
}

impl<K: ?Sized, F> KeyEq<K> for F
where
    F: Fn(&K, &K) -> bool,
{
    #[inline(always)]
    fn key_eq(&self, a: &K, b: &K) -> bool {
        self(a, b)
    }
}
