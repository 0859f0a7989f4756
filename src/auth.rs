//! Bearer credential model shared by token providers and the API client.

pub mod token;

pub use token::*;
