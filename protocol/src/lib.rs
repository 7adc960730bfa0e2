mod item_id;
pub use item_id::HistoryItemId;
pub mod file_list;
pub mod history;
