//! Persisted stores for the watchlist and notification history

pub mod history;
pub mod watchlist;

pub use history::HistoryStore;
pub use watchlist::WatchlistStore;
