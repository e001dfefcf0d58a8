//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the auth lifecycle core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus (the notification channel for auth events)
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that `core-auth` depends on. It
//! establishes the logging conventions, the configuration surface and the
//! event broadcasting mechanism used throughout the system.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
