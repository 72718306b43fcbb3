//! HTTP request handlers.

pub mod admin;
pub mod articles;
pub mod auth;
pub mod common;
pub mod health;
pub mod issues;
pub mod submissions;
pub mod volumes;

pub use admin::*;
pub use articles::*;
pub use auth::*;
pub use common::*;
pub use health::*;
pub use issues::*;
pub use submissions::*;
pub use volumes::*;
