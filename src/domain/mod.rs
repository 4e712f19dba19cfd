// Domain layer: request/response models and the transport port. No I/O here.

pub mod model;
pub mod ports;
