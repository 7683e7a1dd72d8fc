//! fxrack infrastructure: the real-time side of the rack.

pub mod audio;
