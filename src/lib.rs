pub mod clock;
pub mod db;
pub mod domain;
pub mod error;
pub mod events;
pub mod models;
pub mod native_host;
pub mod tracker;
