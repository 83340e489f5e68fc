use serde::{Deserialize, Serialize};
use std::fmt;

/// Experimental phase a recording row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SegmentLabel {
    Baseline,
    #[serde(rename = "Transition_to_TH")]
    TransitionToTh,
    #[serde(rename = "Transient_Hypofrontality")]
    TransientHypofrontality,
    #[serde(rename = "Transition_to_Flow")]
    TransitionToFlow,
    Flow,
}

impl SegmentLabel {
    pub const COUNT: usize = 5;

    /// All labels, in the order an experiment moves through them
    pub const ALL: [SegmentLabel; Self::COUNT] = [
        SegmentLabel::Baseline,
        SegmentLabel::TransitionToTh,
        SegmentLabel::TransientHypofrontality,
        SegmentLabel::TransitionToFlow,
        SegmentLabel::Flow,
    ];

    /// Label text as it appears in the `State` column
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentLabel::Baseline => "Baseline",
            SegmentLabel::TransitionToTh => "Transition_to_TH",
            SegmentLabel::TransientHypofrontality => "Transient_Hypofrontality",
            SegmentLabel::TransitionToFlow => "Transition_to_Flow",
            SegmentLabel::Flow => "Flow",
        }
    }

    /// Look up a label by its `State` column text (exact match)
    pub fn from_label(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|label| label.as_str() == text)
    }

    /// Position of this label within [`SegmentLabel::ALL`]
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for SegmentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
