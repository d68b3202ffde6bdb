pub mod history;
pub mod live;
pub mod nse;
pub mod search;
pub mod setup;
pub mod ui;
