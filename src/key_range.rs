// Copyright 2025 RisingWave Labs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::cmp::Ordering;

use bytes::Bytes;

/// User-supplied total order over opaque keys. Every key comparison the
/// picker performs goes through this trait, so the engine can plug in its
/// own collation.
pub trait KeyComparator: Send + Sync {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

/// Plain lexicographic byte order, the default when the engine does not
/// supply a comparator.
#[derive(Default, Debug, Clone, Copy)]
pub struct BytewiseComparator;

impl KeyComparator for BytewiseComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}

/// Inclusive user-key interval `[left, right]` covered by one sstable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyRange {
    pub left: Bytes,
    pub right: Bytes,
}

impl KeyRange {
    pub fn new(left: Bytes, right: Bytes) -> Self {
        Self { left, right }
    }

    pub fn overlaps(&self, other: &KeyRange, ucmp: &dyn KeyComparator) -> bool {
        ucmp.compare(&self.left, &other.right) != Ordering::Greater
            && ucmp.compare(&other.left, &self.right) != Ordering::Greater
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(left: &str, right: &str) -> KeyRange {
        KeyRange::new(
            Bytes::copy_from_slice(left.as_bytes()),
            Bytes::copy_from_slice(right.as_bytes()),
        )
    }

    #[test]
    fn test_overlap() {
        let ucmp = BytewiseComparator;
        assert!(range("a", "c").overlaps(&range("b", "d"), &ucmp));
        assert!(range("a", "c").overlaps(&range("c", "d"), &ucmp));
        assert!(!range("a", "c").overlaps(&range("d", "e"), &ucmp));
        assert!(range("b", "b").overlaps(&range("a", "z"), &ucmp));
    }
}
