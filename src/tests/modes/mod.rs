use crate::modes::{insert::ViInsert, normal::ViNormal, ViMode};

pub mod normal;
pub mod insert;
pub mod visual;
pub mod ex;
