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

use crate::key_range::KeyRange;

/// Metadata of one immutable sorted-string table. The picker only ever
/// reads these records; it never touches file contents.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SstableInfo {
    pub sst_id: u64,
    pub key_range: KeyRange,
    /// On-disk size of the file.
    pub file_size: u64,
    /// Raw value bytes before compression, used by the small-file sweep.
    pub uncompressed_file_size: u64,
}

impl SstableInfo {
    pub fn smallest(&self) -> &[u8] {
        &self.key_range.left
    }

    pub fn largest(&self) -> &[u8] {
        &self.key_range.right
    }
}
