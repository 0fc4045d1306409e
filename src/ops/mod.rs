pub mod history;
pub mod list_view;
pub mod retention;
pub mod store;
