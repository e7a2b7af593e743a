//! Test utilities: an in-memory metadata source and fixtures.
