// src/test_utils/mod.rs

pub mod mock_cache;

pub use mock_cache::{BrokenMetricsAdapter, FailingStore, FixedMetricsAdapter};
