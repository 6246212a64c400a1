use std::hash::{Hash, Hasher};
use derive_builder::Builder;
use derive_more::{BitAnd, BitOr, BitOrAssign};
use zenith_core::collections::DefaultHasher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageFormat {
    #[default]
    Rgba8Unorm,
    Rgba8Srgb,
    Bgra8Unorm,
    Rg16Float,
    Rgba16Float,
    Rgba32Float,
    R11G11B10Float,
    R32Float,
    R32Uint,
    D16Unorm,
    D24UnormS8Uint,
    D32Float,
}

impl ImageFormat {
    #[inline]
    pub fn is_depth(self) -> bool {
        matches!(self, ImageFormat::D16Unorm | ImageFormat::D24UnormS8Uint | ImageFormat::D32Float)
    }

    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            ImageFormat::D16Unorm => 2,
            ImageFormat::Rgba8Unorm
            | ImageFormat::Rgba8Srgb
            | ImageFormat::Bgra8Unorm
            | ImageFormat::Rg16Float
            | ImageFormat::R11G11B10Float
            | ImageFormat::R32Float
            | ImageFormat::R32Uint
            | ImageFormat::D24UnormS8Uint
            | ImageFormat::D32Float => 4,
            ImageFormat::Rgba16Float => 8,
            ImageFormat::Rgba32Float => 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, BitOr, BitOrAssign, BitAnd)]
pub struct ImageUsage(u32);

impl ImageUsage {
    pub const NONE: Self = Self(0);
    pub const ATTACHMENT: Self = Self(1 << 0);
    pub const STORAGE: Self = Self(1 << 1);
    pub const SAMPLED: Self = Self(1 << 2);
    pub const TRANSFER_SRC: Self = Self(1 << 3);
    pub const TRANSFER_DST: Self = Self(1 << 4);

    #[inline]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, BitOr, BitOrAssign, BitAnd)]
pub struct BufferUsage(u32);

impl BufferUsage {
    pub const NONE: Self = Self(0);
    pub const STORAGE: Self = Self(1 << 0);
    pub const UNIFORM: Self = Self(1 << 1);
    pub const INDEX: Self = Self(1 << 2);
    pub const VERTEX: Self = Self(1 << 3);
    pub const INDIRECT: Self = Self(1 << 4);
    pub const TRANSFER_SRC: Self = Self(1 << 5);
    pub const TRANSFER_DST: Self = Self(1 << 6);

    #[inline]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemoryUsage {
    #[default]
    GpuOnly,
    CpuToGpu,
    GpuToCpu,
}

/// What happens to the content of a transient resource on its first use in a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClearMode {
    #[default]
    DontCare,
    Load,
    Clear,
}

impl ClearMode {
    #[inline]
    pub fn is_clear(self) -> bool {
        self == ClearMode::Clear
    }
}

#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(default)]
pub struct ImageDesc {
    #[builder(setter(into))]
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub layers: u32,
    pub mips: u32,
    pub format: ImageFormat,
    pub usage: ImageUsage,
    pub is_cube_map: bool,
    pub clear_mode: ClearMode,
    pub clear_color: [f32; 4],
}

impl Default for ImageDesc {
    fn default() -> Self {
        Self {
            name: String::new(),
            width: 1,
            height: 1,
            depth: 1,
            layers: 1,
            mips: 1,
            format: ImageFormat::default(),
            usage: ImageUsage::ATTACHMENT | ImageUsage::SAMPLED,
            is_cube_map: false,
            clear_mode: ClearMode::default(),
            clear_color: [0.0; 4],
        }
    }
}

impl ImageDesc {
    pub fn new_2d(name: impl Into<String>, width: u32, height: u32, format: ImageFormat) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            format,
            ..Default::default()
        }
    }

    pub fn with_clear(mut self, clear_color: [f32; 4]) -> Self {
        self.clear_mode = ClearMode::Clear;
        self.clear_color = clear_color;
        self
    }

    /// Hash of everything except the debug name.
    /// Images with equal hashes are interchangeable in the transient pool.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::fixed();
        self.width.hash(&mut hasher);
        self.height.hash(&mut hasher);
        self.depth.hash(&mut hasher);
        self.layers.hash(&mut hasher);
        self.mips.hash(&mut hasher);
        self.format.hash(&mut hasher);
        self.usage.hash(&mut hasher);
        self.is_cube_map.hash(&mut hasher);
        self.clear_mode.hash(&mut hasher);
        for channel in self.clear_color {
            channel.to_bits().hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Saturates at `u64::MAX`, see [`ImageDesc::checked_estimated_size`].
    pub fn estimated_size(&self) -> u64 {
        self.checked_estimated_size().unwrap_or(u64::MAX)
    }

    pub fn checked_estimated_size(&self) -> Option<u64> {
        let mut size = 0u64;
        for mip in 0..self.mips.min(u32::BITS) {
            let width = (self.width >> mip).max(1) as u64;
            let height = (self.height >> mip).max(1) as u64;
            let mip_size = width
                .checked_mul(height)?
                .checked_mul(self.depth.max(1) as u64)?
                .checked_mul(self.format.bytes_per_pixel() as u64)?;
            size = size.checked_add(mip_size)?;
        }
        size.checked_mul(self.layers.max(1) as u64)
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 || self.depth == 0 {
            return Err(format!("extent {}x{}x{} must not be zero", self.width, self.height, self.depth));
        }
        if self.layers == 0 || self.mips == 0 {
            return Err("layer and mip count must not be zero".to_owned());
        }
        if self.checked_estimated_size().is_none() {
            return Err(format!("{}x{}x{} with {} layer(s) overflows the addressable size", self.width, self.height, self.depth, self.layers));
        }
        if self.is_cube_map && self.layers % 6 != 0 {
            return Err(format!("cube map needs a multiple of 6 layers, got {}", self.layers));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Builder)]
#[builder(default)]
pub struct BufferDesc {
    #[builder(setter(into))]
    pub name: String,
    pub element_size: u64,
    pub count: u64,
    pub usage: BufferUsage,
    pub memory_usage: MemoryUsage,
    pub clear_mode: ClearMode,
}

impl Default for BufferDesc {
    fn default() -> Self {
        Self {
            name: String::new(),
            element_size: 1,
            count: 1,
            usage: BufferUsage::STORAGE,
            memory_usage: MemoryUsage::default(),
            clear_mode: ClearMode::default(),
        }
    }
}

impl BufferDesc {
    pub fn new(name: impl Into<String>, element_size: u64, count: u64, usage: BufferUsage) -> Self {
        Self {
            name: name.into(),
            element_size,
            count,
            usage,
            ..Default::default()
        }
    }

    pub fn with_clear(mut self) -> Self {
        self.clear_mode = ClearMode::Clear;
        self
    }

    /// Saturates at `u64::MAX`, see [`BufferDesc::checked_size`].
    #[inline]
    pub fn size(&self) -> u64 {
        self.checked_size().unwrap_or(u64::MAX)
    }

    #[inline]
    pub fn checked_size(&self) -> Option<u64> {
        self.element_size.checked_mul(self.count)
    }

    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::fixed();
        self.element_size.hash(&mut hasher);
        self.count.hash(&mut hasher);
        self.usage.hash(&mut hasher);
        self.memory_usage.hash(&mut hasher);
        self.clear_mode.hash(&mut hasher);
        hasher.finish()
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        match self.checked_size() {
            Some(0) => return Err("buffer size must not be zero".to_owned()),
            None => return Err(format!("{} elements of {} bytes overflow the addressable size", self.count, self.element_size)),
            Some(_) => {}
        }
        Ok(())
    }
}
