mod store;

pub use store::{FileResultSink, StoreError, read_artifact, read_snapshot};
