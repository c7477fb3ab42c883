// Domain layer: core models, ports (interfaces) and the numerical services.

pub mod model;
pub mod ports;

pub mod services;
