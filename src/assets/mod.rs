use std::sync::Arc;

pub mod decode;

/// A frame after decode: premultiplied RGBA8, row-major, tightly packed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedFrame {
    pub width: u32,
    pub height: u32,
    pub rgba8_premul: Arc<Vec<u8>>,
}
