#![allow(dead_code)]

pub mod fixtures;
pub mod iclip_env;
