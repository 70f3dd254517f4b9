pub mod engine;
pub mod fragment_stream;
pub mod llm_client;
pub mod marker_scanner;
pub mod prompt_builder;
pub mod protocol;
pub mod state_store;
pub mod status_parser;
pub mod turn_controller;
