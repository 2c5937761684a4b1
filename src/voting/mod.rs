pub mod aggregate;
pub mod analytics;
pub mod merge;
pub mod scale;

pub use aggregate::{aggregate, AggregateResults, ItemResult};
pub use analytics::{build_record, summarize_channel};
pub use merge::{merge_ballot, merge_entries};
pub use scale::TierScale;
