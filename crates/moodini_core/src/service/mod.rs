//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate controller calls into use-case level APIs.
//! - Keep transport layers decoupled from storage details.

pub mod question_service;
