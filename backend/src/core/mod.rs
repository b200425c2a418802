pub mod api_types;
pub mod catalog;
pub mod models;
pub mod storage;
pub mod watchlist;
