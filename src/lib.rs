pub mod auth;
pub mod cmd;
pub mod config;
pub mod db;
pub mod dirs;
pub mod display;
pub mod logs;
pub mod now;
pub mod proxy;
pub mod rsa;
pub mod server;
pub mod table;
