pub mod config;
pub mod demo_feed;
pub mod format;
pub mod gateway;
pub mod http_client;
pub mod nav;
pub mod state;
pub mod sync;
