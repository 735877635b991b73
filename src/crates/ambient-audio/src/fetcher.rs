//! Fetching and decoding sound assets
//!
//! Assets are fetched as raw bytes from an [`AssetSource`] and decoded with
//! Symphonia into planar f32 channels. Nothing is cached: each play fetches
//! and decodes its asset again.

use crate::{AudioError, Result};
use ambient_core::{AudioAsset, DecodedBuffer};
use async_trait::async_trait;
use std::io::Cursor;
use std::path::PathBuf;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;

/// Somewhere sound assets can be fetched from
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Fetch the raw, still encoded bytes of an asset
    async fn fetch(&self, asset: &AudioAsset) -> Result<Vec<u8>>;
}

/// Fetches assets with a plain HTTP GET against `{base_url}/{path}`
pub struct HttpAssetSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAssetSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Use a preconfigured client (proxies, timeouts, headers)
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        HttpAssetSource {
            client,
            base_url: base_url.into(),
        }
    }

    /// URL an asset is fetched from
    pub fn url_for(&self, asset: &AudioAsset) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            asset.path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl AssetSource for HttpAssetSource {
    async fn fetch(&self, asset: &AudioAsset) -> Result<Vec<u8>> {
        let url = self.url_for(asset);
        log::debug!("Fetching {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AudioError::FetchError(format!("Failed to download {}: {}", url, e)))?
            .error_for_status()
            .map_err(|e| AudioError::FetchError(format!("Failed to download {}: {}", url, e)))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AudioError::FetchError(format!("Failed to read bytes: {}", e)))?;

        Ok(bytes.to_vec())
    }
}

/// Reads assets from a local directory
pub struct FileAssetSource {
    root: PathBuf,
}

impl FileAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileAssetSource { root: root.into() }
    }

    pub fn path_for(&self, asset: &AudioAsset) -> PathBuf {
        self.root.join(&asset.path)
    }
}

#[async_trait]
impl AssetSource for FileAssetSource {
    async fn fetch(&self, asset: &AudioAsset) -> Result<Vec<u8>> {
        let path = self.path_for(asset);
        log::debug!("Reading {}", path.display());

        tokio::fs::read(&path).await.map_err(|e| {
            AudioError::FetchError(format!("Failed to read {}: {}", path.display(), e))
        })
    }
}

/// Pick an asset source for a base location: HTTP for `http(s)://` URLs,
/// the filesystem otherwise
pub fn source_for_base(base: &str) -> Box<dyn AssetSource> {
    if base.starts_with("http://") || base.starts_with("https://") {
        Box::new(HttpAssetSource::new(base))
    } else {
        Box::new(FileAssetSource::new(base))
    }
}

/// Decode an encoded audio file into planar f32 channels
///
/// `extension` is a format hint (e.g., "wav", "mp3"); the format is probed
/// from the data either way.
pub fn decode_audio(data: Vec<u8>, extension: Option<&str>) -> Result<DecodedBuffer> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AudioError::DecodeError(format!("Failed to probe format: {}", e)))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::DecodeError("No valid audio track found".to_string()))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::DecodeError(format!("Failed to create decoder: {}", e)))?;

    let mut sample_rate = codec_params.sample_rate;
    let mut channels: Vec<Vec<f32>> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(AudioError::DecodeError(format!("Format error: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                sample_rate.get_or_insert(decoded.spec().rate);
                append_planes(&decoded, &mut channels);
            }
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping undecodable packet: {}", e);
            }
            Err(e) => {
                return Err(AudioError::DecodeError(format!(
                    "Failed to decode packet: {}",
                    e
                )));
            }
        }
    }

    let buffer = DecodedBuffer::new(channels, sample_rate.unwrap_or(44100));
    if buffer.is_empty() {
        return Err(AudioError::DecodeError("No audio samples decoded".to_string()));
    }

    log::debug!(
        "Decoded {} frames, {} channels at {} Hz",
        buffer.len(),
        buffer.channel_count(),
        buffer.sample_rate()
    );

    Ok(buffer)
}

/// Append one decoded packet to the per-channel sample vectors
fn append_planes(buffer: &AudioBufferRef, channels: &mut Vec<Vec<f32>>) {
    match buffer {
        AudioBufferRef::F32(buf) => extend_planes(&**buf, channels, |s| s),
        // [0, 255] -> [-1.0, 1.0]
        AudioBufferRef::U8(buf) => extend_planes(&**buf, channels, |s| (s as f32 / 127.5) - 1.0),
        AudioBufferRef::U16(buf) => extend_planes(&**buf, channels, |s| (s as f32 / 32767.5) - 1.0),
        #[allow(deprecated)]
        AudioBufferRef::U24(buf) => {
            extend_planes(&**buf, channels, |s| (s.into_u32() as f32 / 8388607.5) - 1.0)
        }
        AudioBufferRef::U32(buf) => {
            extend_planes(&**buf, channels, |s| (s as f32 / 2147483647.5) - 1.0)
        }
        AudioBufferRef::S8(buf) => extend_planes(&**buf, channels, |s| s as f32 / 128.0),
        AudioBufferRef::S16(buf) => extend_planes(&**buf, channels, |s| s as f32 / 32768.0),
        #[allow(deprecated)]
        AudioBufferRef::S24(buf) => {
            extend_planes(&**buf, channels, |s| s.into_i32() as f32 / 8388608.0)
        }
        AudioBufferRef::S32(buf) => extend_planes(&**buf, channels, |s| s as f32 / 2147483648.0),
        AudioBufferRef::F64(buf) => extend_planes(&**buf, channels, |s| s as f32),
    }
}

fn extend_planes<S: Sample>(
    buffer: &AudioBuffer<S>,
    channels: &mut Vec<Vec<f32>>,
    convert: impl Fn(S) -> f32,
) {
    let planes = buffer.planes();
    let planes = planes.planes();
    if channels.len() < planes.len() {
        channels.resize_with(planes.len(), Vec::new);
    }
    for (out, plane) in channels.iter_mut().zip(planes.iter()) {
        out.extend(plane.iter().map(|&s| convert(s)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambient_core::SoundCategory;

    fn wav_bytes(channels: u16, frames: &[i16]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in frames {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_wav_planar() {
        // Interleaved L/R pairs
        let data = wav_bytes(2, &[16384, -16384, 8192, -8192, 0, 0]);
        let buffer = decode_audio(data, Some("wav")).unwrap();

        assert_eq!(buffer.sample_rate(), 22050);
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.channel(0).unwrap(), &[0.5, 0.25, 0.0]);
        assert_eq!(buffer.channel(1).unwrap(), &[-0.5, -0.25, 0.0]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = decode_audio(b"definitely not audio".to_vec(), Some("mp3"));
        assert!(matches!(result, Err(AudioError::DecodeError(_))));
    }

    #[test]
    fn test_http_url_joins_cleanly() {
        let source = HttpAssetSource::new("https://example.com/sounds/");
        let asset = AudioAsset::new("rain", "Rain", "", "/rain.mp3", SoundCategory::Nature);
        assert_eq!(source.url_for(&asset), "https://example.com/sounds/rain.mp3");
    }

    /// Answer a single HTTP request on a loopback port with `response`
    async fn serve_once(response: &'static [u8]) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            socket.write_all(response).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{}/sounds", addr)
    }

    fn loopback_source(base: String) -> HttpAssetSource {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        HttpAssetSource::with_client(base, client)
    }

    #[tokio::test]
    async fn test_http_source_rejects_error_status() {
        let base = serve_once(
            b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await;
        let source = loopback_source(base);
        let asset = AudioAsset::new("rain", "Rain", "", "rain.mp3", SoundCategory::Nature);

        let result = source.fetch(&asset).await;
        assert!(matches!(result, Err(AudioError::FetchError(_))));
    }

    #[tokio::test]
    async fn test_http_source_returns_body() {
        let base = serve_once(
            b"HTTP/1.1 200 OK\r\ncontent-length: 5\r\nconnection: close\r\n\r\nRIFF!",
        )
        .await;
        let source = loopback_source(base);
        let asset = AudioAsset::new("rain", "Rain", "", "rain.wav", SoundCategory::Nature);

        assert_eq!(source.fetch(&asset).await.unwrap(), b"RIFF!".to_vec());
    }

    #[tokio::test]
    async fn test_file_source_missing_file() {
        let source = FileAssetSource::new("/nonexistent/sounds");
        let asset = AudioAsset::new("rain", "Rain", "", "rain.wav", SoundCategory::Nature);
        let result = source.fetch(&asset).await;
        assert!(matches!(result, Err(AudioError::FetchError(_))));
    }
}
