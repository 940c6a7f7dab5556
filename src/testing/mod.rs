//! Deterministic test signals and coefficient blobs.
//!
//! The detector is exercised without microphone hardware or shipped assets:
//! these helpers synthesize seeded clap bursts, tones, and stand-in window /
//! mel basis blobs with the exact byte layout the loaders expect.

pub mod signals;
