pub mod adapter;
pub mod app;
pub mod format;
pub mod observable;
pub mod render;
pub mod scope;
pub mod tracker;
