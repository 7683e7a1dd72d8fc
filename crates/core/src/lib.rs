//! fxrack core: parameter declarations, the shared parameter store, the
//! effect capability and the block/sample processing pipeline.

pub mod domain;
