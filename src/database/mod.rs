// Database module
// SQLite store of documents and their chunks, read back to hydrate retrieval results

pub mod sqlite;

pub use sqlite::*;
