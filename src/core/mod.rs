pub mod assembler;
pub mod collectors;
pub mod executor;
pub mod orchestrator;
pub mod parser;
pub mod plugins;
