//! Integration tests with mock HTTP server

mod mock_server;
mod scenarios;
mod vendors;
