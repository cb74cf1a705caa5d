// Analysis history: the JSON-file store, report rendering and export.

pub mod handlers;
pub mod report;
pub mod store;

pub use store::HistoryStore;
