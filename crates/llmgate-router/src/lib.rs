//! HTTP routers: the OpenAI-compatible client API and the admin surface.

mod admin;
mod client;

pub use admin::{AdminState, admin_router};
pub use client::{ClientApiState, client_router};
