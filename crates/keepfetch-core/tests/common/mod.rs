#![allow(dead_code)]

pub mod keepalive_server;
pub mod tracked;
