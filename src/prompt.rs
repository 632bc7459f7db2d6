//! Prompt evolution: the semantic prompt mutates a little every iteration.

/// Descriptors appended to a lane's base prompt when evolution is on.
pub const EVOLUTION_VOCABULARY: [&str; 12] = [
    "metallic",
    "granular",
    "breathing",
    "crystalline",
    "submerged",
    "distorted",
    "glassy",
    "organic",
    "spectral",
    "eroded",
    "shimmering",
    "hollow",
];

/// Prompt for iteration `iteration`.
///
/// Without evolution this is the base prompt. With it, one descriptor from
/// [`EVOLUTION_VOCABULARY`] is appended, picked by
/// `(phase × len + iteration) mod len` so `prompt_phase` rotates the sequence.
pub fn evolve(base: &str, phase: f32, iteration: u64, enabled: bool) -> String {
    if !enabled {
        return base.to_string();
    }
    let descriptor = EVOLUTION_VOCABULARY[descriptor_index(phase, iteration)];
    if base.trim().is_empty() {
        descriptor.to_string()
    } else {
        format!("{}, {}", base, descriptor)
    }
}

pub fn descriptor_index(phase: f32, iteration: u64) -> usize {
    let len = EVOLUTION_VOCABULARY.len() as u64;
    let offset = (phase.clamp(0.0, 1.0) * len as f32).floor() as u64;
    ((offset + iteration) % len) as usize
}
