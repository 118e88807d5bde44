// Domain layer: record shapes, schema registry and ports (interfaces).

pub mod model;
pub mod ports;
pub mod schema;
