pub mod logger;
pub mod result;
pub mod terminal;
pub mod ui;
