//! End-to-end tests for beacon-pos.
//!
//! Every test runs against a mock verifier (wiremock) and a temporary
//! artifact directory, so nothing leaves the machine.

mod harness;

mod flow;
mod verifier;
