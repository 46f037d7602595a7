// Log audit: static scan of every Rust source file for tracing calls that
// carry patient text. Prevents note content, prompts or model output from
// leaking into logs through a later change.
