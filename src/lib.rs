//! HOA console gateway: session guard, role resolution, and authorization
//! management over a hosted Supabase backend.

pub mod auth;
pub mod backend;
pub mod config;
pub mod routes;
pub mod state;
