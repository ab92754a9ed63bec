pub mod config;
pub mod db;
pub mod history;
pub mod llm;
pub mod pipeline;
pub mod server;
pub mod ui;

#[cfg(test)]
pub(crate) mod testing;
