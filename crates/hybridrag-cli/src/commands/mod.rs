pub mod fuse;
pub mod ingest;
pub mod init;
pub mod query;
pub mod setup;
