pub mod activity;
pub mod client;
pub mod error;
pub mod input;
pub mod logging;
pub mod proxy;
pub mod registry;
pub mod runner;
