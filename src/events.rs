use std::path::PathBuf;

/// Discrete step derived from wheel, touch, pointer-drag or keyboard input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepIntent {
    Forward,
    Backward,
}

impl StepIntent {
    pub fn direction(self) -> i32 {
        match self {
            Self::Forward => 1,
            Self::Backward => -1,
        }
    }
}

/// Decoded image ready for upload, with its full mip chain (level 0 first).
#[derive(Debug, Clone)]
pub struct DecodedTexture {
    pub source: PathBuf,
    pub width: u32,
    pub height: u32,
    pub mips: Vec<MipLevel>,
}

impl DecodedTexture {
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

#[derive(Debug, Clone)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Result of a texture batch: survivors in original source order.
#[derive(Debug)]
pub struct TextureBatch {
    pub generation: u64,
    pub textures: Vec<DecodedTexture>,
}

/// Snapshot published after every section-controller mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectionStatus {
    pub index: Option<usize>,
    pub animating: bool,
    pub sub_phase: u8,
}

/// External control of the viewer.
#[derive(Debug, Clone)]
pub enum ViewerCommand {
    /// Navigation-style jump; ignored while animating or when already there.
    GoToSection(i64),
    Step(StepIntent),
}
