//! Workspace integration tests for the translations bridge
//!
//! The tests live under `tests/` and exercise the model pipeline and the
//! router together against a mock attachments server.
