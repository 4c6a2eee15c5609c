// tests/integration/main.rs
#[path = "../common/mod.rs"]
mod common;

mod api_tests;
mod identity_tests;
mod lockout_tests;
mod storage_tests;
