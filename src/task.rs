//! Task generation
//!
//! A run is a fixed batch of `iterations` tasks. Iteration `i` targets pool
//! file `i % files`, so every file in the pool is hit either
//! `ceil(iterations / files)` or `floor(iterations / files)` times.

use bytes::Bytes;

use crate::config::file_name;

/// One unit of benchmark work: an iteration and the path it targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub iteration: usize,
    pub file_index: usize,
    pub path: String,
}

/// Lazy, finite sequence of exactly `iterations` tasks cycling over the pool.
#[derive(Debug)]
pub struct TaskGenerator {
    prefix: String,
    iterations: usize,
    files: usize,
    next: usize,
}

impl TaskGenerator {
    /// `files` must be at least 1 (checked by `BenchmarkConfig::validate`).
    pub fn new(prefix: &str, iterations: usize, files: usize) -> Self {
        debug_assert!(files >= 1, "file pool must not be empty");
        Self {
            prefix: prefix.to_string(),
            iterations,
            files: files.max(1),
            next: 0,
        }
    }

    /// Path of pool file `index` under the generator's prefix.
    pub fn path_for(&self, index: usize) -> String {
        join_path(&self.prefix, &file_name(index))
    }
}

impl Iterator for TaskGenerator {
    type Item = Task;

    fn next(&mut self) -> Option<Task> {
        if self.next >= self.iterations {
            return None;
        }
        let iteration = self.next;
        self.next += 1;

        let file_index = iteration % self.files;
        Some(Task {
            iteration,
            file_index,
            path: self.path_for(file_index),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.iterations - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TaskGenerator {}

fn join_path(prefix: &str, name: &str) -> String {
    let base = prefix.trim_end_matches('/');
    if base.is_empty() {
        if prefix.starts_with('/') {
            format!("/{}", name)
        } else {
            name.to_string()
        }
    } else {
        format!("{}/{}", base, name)
    }
}

/// Shared write payload: `size` bytes with `byte[i] = i % 256`.
/// Built once per write run; `Bytes` clones share the same allocation.
pub fn build_write_payload(size: usize) -> Bytes {
    let data: Vec<u8> = (0..size).map(|i| (i % 256) as u8).collect();
    Bytes::from(data)
}
