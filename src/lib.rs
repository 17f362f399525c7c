pub mod cache;
pub mod category;
pub mod config;
pub mod error;
pub mod export;
pub mod gemini;
pub mod http_client;
pub mod merge;
pub mod pipeline;
pub mod prompt;
pub mod record;
pub mod response;
pub mod workbook;
