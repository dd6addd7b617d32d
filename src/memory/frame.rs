use std::fmt;

/// State of one physical frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameState {
    #[default]
    Free,
    /// Loaded and unmodified.
    Clean,
    /// Loaded and modified by a write hit.
    Dirty,
}

impl FrameState {
    pub fn is_loaded(&self) -> bool {
        !matches!(self, FrameState::Free)
    }

    /// Single-character form used by the snapshot printer.
    pub fn symbol(&self) -> char {
        match self {
            FrameState::Free => '-',
            FrameState::Clean => '0',
            FrameState::Dirty => '1',
        }
    }
}

impl fmt::Display for FrameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}
