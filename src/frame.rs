use std::{
    sync::{Arc, mpsc},
    time::Duration,
};

use base64::Engine as _;

use crate::{
    NowcastError, NowcastResult,
    assets::{
        DecodedFrame,
        decode::{decode_image, encode_png},
    },
};

/// One time step of an image sequence, held in its encoded form.
///
/// Frames are immutable and cheap to clone. They travel over the wire as
/// `data:` URLs.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Frame {
    bytes: Arc<[u8]>,
}

/// Ordered frames for time steps `t = 0..n-1`.
pub type Sequence = Vec<Frame>;

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];

impl Frame {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Self {
            bytes: Arc::from(bytes),
        }
    }

    /// Encode a decoded raster back into a PNG frame.
    pub fn from_decoded(decoded: &DecodedFrame) -> NowcastResult<Self> {
        let png = encode_png(&decoded.rgba8_premul, decoded.width, decoded.height)?;
        Ok(Self::from_bytes(png))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> &'static str {
        if self.bytes.starts_with(PNG_MAGIC) {
            "image/png"
        } else if self.bytes.starts_with(JPEG_MAGIC) {
            "image/jpeg"
        } else {
            "application/octet-stream"
        }
    }

    pub fn to_data_url(&self) -> String {
        let payload = base64::engine::general_purpose::STANDARD.encode(&self.bytes);
        format!("data:{};base64,{payload}", self.mime())
    }

    /// Parse a `data:<mime>;base64,<payload>` URL. A bare base64 payload is
    /// accepted as well.
    pub fn from_data_url(url: &str) -> NowcastResult<Self> {
        let payload = match url.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest
                    .split_once(',')
                    .ok_or_else(|| NowcastError::decode("data URL has no payload separator"))?;
                if !header.ends_with(";base64") {
                    return Err(NowcastError::decode("data URL is not base64 encoded"));
                }
                payload
            }
            None => url,
        };
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| NowcastError::decode(format!("invalid base64 payload: {e}")))?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn decode(&self) -> NowcastResult<DecodedFrame> {
        decode_image(&self.bytes)
    }

    /// Decode on a helper thread, giving up after `timeout`.
    ///
    /// A decode that outlives the timeout keeps running detached; its
    /// result is dropped.
    pub fn decode_with_timeout(&self, timeout: Duration) -> NowcastResult<DecodedFrame> {
        if timeout.is_zero() {
            return Err(NowcastError::validation("decode timeout must be non-zero"));
        }
        let (tx, rx) = mpsc::channel();
        let bytes = Arc::clone(&self.bytes);
        std::thread::Builder::new()
            .name("nowcast-decode".to_string())
            .spawn(move || {
                let _ = tx.send(decode_image(&bytes));
            })
            .map_err(|e| NowcastError::decode(format!("spawn decode thread: {e}")))?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                let millis = timeout.as_millis() as u64;
                tracing::warn!(millis, "frame decode timed out");
                Err(NowcastError::DecodeTimeout { millis })
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(NowcastError::decode("decode thread exited without a result"))
            }
        }
    }
}

impl serde::Serialize for Frame {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_data_url())
    }
}

impl<'de> serde::Deserialize<'de> for Frame {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        Frame::from_data_url(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn png_frame(w: u32, h: u32) -> Frame {
        let img = image::RgbaImage::from_pixel(w, h, image::Rgba([9, 8, 7, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        Frame::from_bytes(buf)
    }

    #[test]
    fn data_url_carries_mime_and_payload() {
        let f = png_frame(2, 2);
        let url = f.to_data_url();
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(Frame::from_data_url(&url).unwrap(), f);
    }

    #[test]
    fn bare_base64_is_accepted() {
        let f = png_frame(1, 1);
        let bare = base64::engine::general_purpose::STANDARD.encode(f.bytes());
        assert_eq!(Frame::from_data_url(&bare).unwrap(), f);
    }

    #[test]
    fn non_base64_data_url_is_rejected() {
        assert!(Frame::from_data_url("data:image/png,abc").is_err());
        assert!(Frame::from_data_url("data:image/png;base64").is_err());
    }

    #[test]
    fn serde_uses_data_urls() {
        let frames = vec![png_frame(1, 1)];
        let json = serde_json::to_string(&frames).unwrap();
        assert!(json.contains("data:image/png;base64,"));
        let back: Vec<Frame> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, frames);
    }

    #[test]
    fn decode_with_timeout_returns_dimensions() {
        let decoded = png_frame(5, 3)
            .decode_with_timeout(Duration::from_secs(5))
            .unwrap();
        assert_eq!((decoded.width, decoded.height), (5, 3));
    }

    #[test]
    fn decode_with_timeout_gives_up_on_slow_decode() {
        let err = png_frame(1024, 1024)
            .decode_with_timeout(Duration::from_nanos(1))
            .unwrap_err();
        assert!(matches!(err, NowcastError::DecodeTimeout { .. }));
    }

    #[test]
    fn decode_with_timeout_rejects_zero_timeout() {
        let err = png_frame(1, 1)
            .decode_with_timeout(Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, NowcastError::Validation(_)));
    }

    #[test]
    fn decode_with_timeout_reports_bad_bytes() {
        let err = Frame::from_bytes(vec![1, 2, 3])
            .decode_with_timeout(Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, NowcastError::Decode(_)));
    }
}
