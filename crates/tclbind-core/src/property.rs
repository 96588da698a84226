/// Per-interpreter tunables. Values are stored as `usize`; boolean
/// properties use `0` and `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterpProperty {
    /// Maximum depth of nested script evaluation.
    MaxNestingDepth,
    /// Accept a one-element list where a single native value is expected.
    UnwrapSingletonLists,
    /// Answer a lone `-help` on option-taking commands with a usage line.
    SynthesizeHelp,
}

impl InterpProperty {
    pub fn default_value(&self) -> usize {
        match self {
            InterpProperty::MaxNestingDepth => 1000,
            InterpProperty::UnwrapSingletonLists => 1,
            InterpProperty::SynthesizeHelp => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            InterpProperty::MaxNestingDepth => "max_nesting_depth",
            InterpProperty::UnwrapSingletonLists => "unwrap_singleton_lists",
            InterpProperty::SynthesizeHelp => "synthesize_help",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        assert_eq!(InterpProperty::MaxNestingDepth.default_value(), 1000);
        assert_eq!(InterpProperty::UnwrapSingletonLists.default_value(), 1);
        assert_eq!(InterpProperty::SynthesizeHelp.default_value(), 1);
    }
}
