//! Job kinds: one processor is registered per kind.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Selects which processor handles a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    /// Fast, low-fidelity AI render.
    #[serde(rename = "quick_render", alias = "ai_quick")]
    QuickRender,
    /// High-fidelity AI render.
    #[serde(rename = "detailed_render", alias = "ai_detailed")]
    DetailedRender,
    /// Room 3D model generation.
    #[serde(rename = "3d_model", alias = "model_3d")]
    Model3d,
    /// Masked AI inpainting.
    #[serde(rename = "inpainting")]
    Inpainting,
    /// Style transfer onto an existing image.
    #[serde(rename = "style_transfer")]
    StyleTransfer,
    /// Model or drawing export.
    #[serde(rename = "export")]
    Export,
}

impl JobKind {
    /// Every kind, in declaration order.
    pub const ALL: [JobKind; 6] = [
        JobKind::QuickRender,
        JobKind::DetailedRender,
        JobKind::Model3d,
        JobKind::Inpainting,
        JobKind::StyleTransfer,
        JobKind::Export,
    ];

    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuickRender => "quick_render",
            Self::DetailedRender => "detailed_render",
            Self::Model3d => "3d_model",
            Self::Inpainting => "inpainting",
            Self::StyleTransfer => "style_transfer",
            Self::Export => "export",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
