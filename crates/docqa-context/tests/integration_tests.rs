//! Integration tests for docqa-context

#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::tests_outside_test_module,
        reason = "Test allows"
    )
)]

#[path = "modules/chunking_properties.rs"]
mod chunking_properties;

#[path = "modules/conversation_flow.rs"]
mod conversation_flow;

#[path = "modules/index_round_trip.rs"]
mod index_round_trip;
