//! Cheap keyword pre-filter run before any LLM call.

pub mod noise;

pub use noise::{NoiseGate, NoiseVerdict};
