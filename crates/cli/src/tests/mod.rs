mod payload_tests;
mod support;
