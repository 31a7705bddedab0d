// Bar acquisition: the producer/consumer gate, the session seam and file-backed bar loading
pub mod bar_gate;
pub mod csv_parser;
pub mod session;
