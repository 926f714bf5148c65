// Domain layer: enrollment models, plan table and the ports to external systems.

pub mod model;
pub mod plans;
pub mod ports;
