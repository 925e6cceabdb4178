//! End-to-end tests driving the scanner through a deterministic mock source.

mod mock_source;
mod scanner;
