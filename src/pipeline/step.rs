//! Orchestration steps

use std::fmt;

/// The six steps of a run, in execution order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Step {
    /// Load the tokenizer
    LoadTokenizer,
    /// Build the quantization directive
    BuildDirective,
    /// Load the model, quantizing during load
    LoadModel,
    /// Move every module to CPU
    MoveToCpu,
    /// Save the quantized model
    SaveModel,
    /// Save the tokenizer
    SaveTokenizer,
}

impl Step {
    /// All steps in order
    pub const ALL: [Step; 6] = [
        Step::LoadTokenizer,
        Step::BuildDirective,
        Step::LoadModel,
        Step::MoveToCpu,
        Step::SaveModel,
        Step::SaveTokenizer,
    ];

    /// 1-based position
    #[must_use]
    pub fn number(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).map_or(0, |i| i + 1)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Step::LoadTokenizer => "Loading tokenizer",
            Step::BuildDirective => "Building quantization config",
            Step::LoadModel => "Loading and quantizing model",
            Step::MoveToCpu => "Moving model to CPU",
            Step::SaveModel => "Saving model",
            Step::SaveTokenizer => "Saving tokenizer",
        };
        f.write_str(text)
    }
}
