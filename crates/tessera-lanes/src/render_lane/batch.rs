// Copyright 2025 eraflo
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

/// How descriptors are turned into device writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPolicy {
    /// One device write per descriptor, issued immediately.
    Unbatched,
    /// Descriptors are staged host-side and submitted as fewer, larger writes.
    Batched {
        /// Staged bytes that trigger an intermediate submission.
        max_batch_bytes: u64,
    },
}

impl BatchPolicy {
    /// Returns `true` for [`BatchPolicy::Batched`].
    pub fn is_batched(&self) -> bool {
        matches!(self, BatchPolicy::Batched { .. })
    }
}

/// A contiguous run of staged bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StagedRun {
    pub(crate) offset: u64,
    pub(crate) data: Vec<u8>,
}

/// Host-side staging of the batched policy.
///
/// A write whose destination starts where the previous one ends is appended to
/// the same run, whichever container it came from.
#[derive(Debug, Default)]
pub(crate) struct StagingArea {
    runs: Vec<StagedRun>,
    bytes: u64,
}

impl StagingArea {
    pub(crate) fn push(&mut self, offset: u64, data: &[u8]) {
        self.bytes += data.len() as u64;
        if let Some(last) = self.runs.last_mut() {
            if last.offset + last.data.len() as u64 == offset {
                last.data.extend_from_slice(data);
                return;
            }
        }
        self.runs.push(StagedRun {
            offset,
            data: data.to_vec(),
        });
    }

    pub(crate) fn staged_bytes(&self) -> u64 {
        self.bytes
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub(crate) fn take(&mut self) -> Vec<StagedRun> {
        self.bytes = 0;
        std::mem::take(&mut self.runs)
    }

    pub(crate) fn clear(&mut self) {
        self.bytes = 0;
        self.runs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_writes_share_a_run() {
        let mut staging = StagingArea::default();
        staging.push(0, &[1; 16]);
        staging.push(16, &[2; 16]);
        staging.push(64, &[3; 8]);
        assert_eq!(staging.staged_bytes(), 40);

        let runs = staging.take();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].data.len(), 32);
        assert_eq!(runs[1].offset, 64);
        assert!(staging.is_empty());
        assert_eq!(staging.staged_bytes(), 0);
    }
}
