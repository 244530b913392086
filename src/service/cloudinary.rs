// service/cloudinary.rs
use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use image::ImageFormat;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::{
    config::Config,
    service::payment_provider::{read_provider_json, ProviderError},
};

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("Image data is empty")]
    Empty,
    #[error("Image data is not valid base64")]
    InvalidEncoding,
    #[error("Image is larger than 5 MiB")]
    TooLarge,
    #[error("Unsupported image format, use JPEG, PNG, WebP or GIF")]
    UnsupportedFormat,
}

#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl DecodedImage {
    pub fn mime_type(&self) -> &'static str {
        match self.format {
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::WebP => "image/webp",
            _ => "image/jpeg",
        }
    }

    fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), STANDARD.encode(&self.bytes))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadedImage {
    pub secure_url: String,
    pub public_id: String,
}

/// Accepts raw base64 or a `data:image/...;base64,` URI.
pub fn decode_image(input: &str) -> Result<DecodedImage, ImageError> {
    let data = match input.trim().split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => input.trim(),
    };
    let data: String = data.chars().filter(|c| !c.is_whitespace()).collect();

    if data.is_empty() {
        return Err(ImageError::Empty);
    }
    // Reject before allocating the decoded buffer.
    if data.len() / 4 * 3 > MAX_IMAGE_BYTES + 3 {
        return Err(ImageError::TooLarge);
    }

    let bytes = STANDARD
        .decode(data.as_bytes())
        .map_err(|_| ImageError::InvalidEncoding)?;

    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ImageError::TooLarge);
    }

    match image::guess_format(&bytes) {
        Ok(format @ (ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP | ImageFormat::Gif)) => {
            Ok(DecodedImage { bytes, format })
        }
        _ => Err(ImageError::UnsupportedFormat),
    }
}

/// Cloudinary signature: sorted `key=value` pairs joined with `&`, then the secret.
pub fn sign_params(params: &BTreeMap<&str, String>, api_secret: &str) -> String {
    let to_sign = params
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct CloudinaryService {
    http: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

impl CloudinaryService {
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        Self {
            http,
            cloud_name: config.cloudinary_cloud_name.clone(),
            api_key: config.cloudinary_api_key.clone(),
            api_secret: config.cloudinary_api_secret.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.cloud_name.is_empty() && !self.api_key.is_empty() && !self.api_secret.is_empty()
    }

    /// Signed upload; re-uploading with the same public id replaces the image.
    pub async fn upload_image(
        &self,
        image: &DecodedImage,
        folder: &str,
        public_id: &str,
    ) -> Result<UploadedImage, ProviderError> {
        let mut params = BTreeMap::new();
        params.insert("folder", folder.to_string());
        params.insert("overwrite", "true".to_string());
        params.insert("public_id", public_id.to_string());
        params.insert("timestamp", Utc::now().timestamp().to_string());

        let signature = sign_params(&params, &self.api_secret);

        let mut form: Vec<(&str, String)> = params.into_iter().collect();
        form.push(("file", image.data_uri()));
        form.push(("api_key", self.api_key.clone()));
        form.push(("signature", signature));
        form.push(("signature_algorithm", "sha256".to_string()));

        let response = self
            .http
            .post(format!(
                "https://api.cloudinary.com/v1_1/{}/image/upload",
                self.cloud_name
            ))
            .form(&form)
            .send()
            .await?;

        let uploaded: UploadedImage = read_provider_json("cloudinary", response).await?;
        tracing::info!("Uploaded image {} to Cloudinary", uploaded.public_id);

        Ok(uploaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 16] = [
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R',
    ];

    #[test]
    fn test_sign_params_matches_cloudinary_scheme() {
        let mut params = BTreeMap::new();
        params.insert("timestamp", "1315060510".to_string());
        params.insert("folder", "servicehub/workers".to_string());

        assert_eq!(
            sign_params(&params, "abcd"),
            "9c19023d753336d783f18910d870850a14787fda0a29f837e2bbab8e416cbc70"
        );
    }

    #[test]
    fn test_decode_png_from_data_uri() {
        let uri = format!("data:image/png;base64,{}", STANDARD.encode(PNG_HEADER));
        let image = decode_image(&uri).unwrap();
        assert_eq!(image.format, ImageFormat::Png);
        assert_eq!(image.mime_type(), "image/png");
        assert_eq!(image.bytes.len(), PNG_HEADER.len());
    }

    #[test]
    fn test_decode_raw_jpeg() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
        let image = decode_image(&STANDARD.encode(jpeg)).unwrap();
        assert_eq!(image.format, ImageFormat::Jpeg);
    }

    #[test]
    fn test_rejects_non_images_and_bad_base64() {
        assert_eq!(
            decode_image(&STANDARD.encode(b"%PDF-1.7 not an image")).unwrap_err(),
            ImageError::UnsupportedFormat
        );
        assert_eq!(decode_image("!!!not base64!!!").unwrap_err(), ImageError::InvalidEncoding);
        assert_eq!(decode_image("   ").unwrap_err(), ImageError::Empty);
    }

    #[test]
    fn test_rejects_oversized_images() {
        let mut big = PNG_HEADER.to_vec();
        big.resize(MAX_IMAGE_BYTES + 1, 0);
        assert_eq!(decode_image(&STANDARD.encode(&big)).unwrap_err(), ImageError::TooLarge);
    }
}
