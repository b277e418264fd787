pub mod app;
pub mod events;
pub mod fetch;
pub mod session;
pub mod theme;
pub mod ui;
