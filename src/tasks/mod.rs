pub mod analytics_backfill;
