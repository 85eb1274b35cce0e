//! Framing and control token tests
//!
//! These drive `FrameCodec` against mock streams that split, delay and
//! refuse data.

pub mod raw_framing;
