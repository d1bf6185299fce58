/// Data layer: typed records, loading, filtering and aggregation.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → HealthDataset (required columns checked once)
///   └──────────┘
///        │
///        ▼
///   ┌───────────────┐
///   │ HealthDataset  │  Vec<Record>, observed values per field
///   └───────────────┘
///        │   Arc, read-only
///        ▼
///   ┌──────────┐      ┌───────────┐
///   │  filter   │ ──▶ │ aggregate  │  group-by mean / box statistics
///   └──────────┘      └───────────┘
///        ▲                   │
///        │                   ▼
///   ┌────────────────────────────┐
///   │ dashboard                   │  selection change → per-chart summaries
///   └────────────────────────────┘
/// ```

pub mod aggregate;
pub mod dashboard;
pub mod filter;
pub mod loader;
pub mod model;
