pub mod buckets;
pub mod job;

pub use buckets::JobBuckets;
pub use job::{Bucket, OperationJob, UnknownBucket};
