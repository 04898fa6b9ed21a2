pub mod business_metrics;

pub use business_metrics::BusinessMetrics;
