//! 컬렉션 처리 보조 함수 모듈

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// 순서를 유지하면서 중복 제거
///
/// # Example
/// ```ignore
/// let keys = vec!["a", "b", "a"];
/// let unique = unique_ordered(keys); // ["a", "b"]
/// ```
#[inline]
pub fn unique_ordered<T: Eq + Hash + Clone>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// key 함수 기준으로 순서를 유지하며 중복 제거
#[inline]
pub fn unique_ordered_by<T, K, F>(items: Vec<T>, key_fn: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(key_fn(item)))
        .collect()
}

/// Vec를 key 기준으로 그룹화
#[inline]
pub fn group_by<T, K, F>(items: Vec<T>, key_fn: F) -> HashMap<K, Vec<T>>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut map: HashMap<K, Vec<T>> = HashMap::new();
    for item in items {
        map.entry(key_fn(&item)).or_default().push(item);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_ordered() {
        assert_eq!(unique_ordered(vec![1, 2, 1, 3, 2]), vec![1, 2, 3]);
    }

    #[test]
    fn test_group_by() {
        let grouped = group_by(vec![1, 2, 3, 4], |n| n % 2);
        assert_eq!(grouped[&0], vec![2, 4]);
        assert_eq!(grouped[&1], vec![1, 3]);
    }
}
