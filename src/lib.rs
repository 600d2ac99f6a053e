#![forbid(unsafe_code)]

pub mod analyze;
pub mod app;
pub mod cli;
pub mod config;
pub mod crawl;
pub mod extract;
pub mod fetch;
pub mod formats;
pub mod gemini;
pub mod grok;
pub mod link;
pub mod llm;
pub mod logging;
pub mod pipeline;
pub mod progress;
pub mod report;
