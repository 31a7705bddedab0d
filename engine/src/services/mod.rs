// Orchestration and output around the engine
pub mod autofib_service;
pub mod report;
