//! Integration tests for the file ID managers

mod local_tests;
