//! # sitesmith
//!
//! Turns a one-paragraph website description into a small multi-file project
//! on disk by chaining text-generation calls.
//!
//! This library provides:
//! - A sandboxed file store rooted at one `generated_project_<N>` directory per run
//! - A four-stage pipeline: planner, architect, coder loop and an optional reviewer
//! - A tool-using session that lets the model read and write files inside the root
//! - An HTTP API for build submission, status polling and downloads
//!
//! ## Example
//!
//! ```rust,ignore
//! use sitesmith::{config::Config, pipeline::Pipeline};
//! use std::sync::Arc;
//!
//! let config = Config::from_env()?;
//! let pipeline = Arc::new(Pipeline::from_config(&config));
//! let handle = pipeline.start("A calculator with a dark theme".into(), None).await?;
//! let outcome = handle.join.await??;
//! println!("{:?}", outcome.files);
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod llm;
pub mod pipeline;
pub mod plan;
pub mod sandbox;
pub mod tools;

pub use config::Config;
