//! HTTP trigger: health probe and run endpoint over a [`reap_core::Runner`].

pub mod auth;
pub mod dto;
pub mod error;
pub mod routes;
pub mod state;
