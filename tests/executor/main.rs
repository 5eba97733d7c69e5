#[path = "../support/mod.rs"]
mod support;

mod lifecycle;
mod scenarios;
