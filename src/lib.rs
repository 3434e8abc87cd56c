//! Personal blog front-end: post index and Markdown bodies from a local
//! directory or a static host, rendered into a themed page shell.

pub mod anchor;
pub mod config;
pub mod content_loader;
pub mod error;
pub mod hot_reload;
pub mod index;
pub mod layout;
pub mod markdown;
pub mod models;
pub mod outline;
pub mod routes;
pub mod source;
pub mod state;
pub mod view;
