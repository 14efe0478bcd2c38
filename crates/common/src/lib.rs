//! Common utilities and types shared across PIA components.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (unverified decoding, time-window checks, constants)
pub mod jwt;
